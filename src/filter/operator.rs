// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Condition operator vocabulary

use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison operator of a single condition.
///
/// Parsing never fails: codes outside the vocabulary are kept as
/// [`Operator::Unknown`] so a malformed rule degrades to a false condition
/// instead of rejecting the whole tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    /// Stringified equality
    Equal,
    /// Stringified inequality
    NotEqual,
    /// Numeric `>`
    Greater,
    /// Numeric `<`
    Less,
    /// Numeric `>=`
    GreaterOrEqual,
    /// Numeric `<=`
    LessOrEqual,
    /// Set membership over `values`
    In,
    /// Set non-membership over `values`
    NotIn,
    /// Case-insensitive substring
    Contains,
    /// Case-insensitive prefix
    StartsWith,
    /// Case-insensitive suffix
    EndsWith,
    /// Absent, null or empty string
    Empty,
    /// Negation of [`Operator::Empty`]
    NotEmpty,
    /// Any other code, kept verbatim for diagnostics
    Unknown(String),
}

impl Operator {
    /// All supported operators, in canonical order
    pub const SUPPORTED: [Operator; 13] = [
        Operator::Equal,
        Operator::NotEqual,
        Operator::Greater,
        Operator::Less,
        Operator::GreaterOrEqual,
        Operator::LessOrEqual,
        Operator::In,
        Operator::NotIn,
        Operator::Contains,
        Operator::StartsWith,
        Operator::EndsWith,
        Operator::Empty,
        Operator::NotEmpty,
    ];

    /// Parse an operator code. Accepts the canonical English codes and the
    /// Portuguese codes stored by earlier questionnaire versions.
    pub fn from_code(code: &str) -> Self {
        match code {
            "EQUAL" | "IGUAL" => Self::Equal,
            "NOT_EQUAL" | "DIFERENTE" => Self::NotEqual,
            "GREATER" | "MAIOR" => Self::Greater,
            "LESS" | "MENOR" => Self::Less,
            "GREATER_OR_EQUAL" | "MAIOR_IGUAL" => Self::GreaterOrEqual,
            "LESS_OR_EQUAL" | "MENOR_IGUAL" => Self::LessOrEqual,
            "IN" | "EM" => Self::In,
            // the context-filter vocabulary used NAO_CONTEM for set non-membership
            "NOT_IN" | "NAO_EM" | "NOT_CONTAINS" | "NAO_CONTEM" => Self::NotIn,
            "CONTAINS" | "CONTEM" => Self::Contains,
            "STARTS_WITH" | "COMECA_COM" => Self::StartsWith,
            "ENDS_WITH" | "TERMINA_COM" => Self::EndsWith,
            "EMPTY" | "VAZIO" | "NOT_EXISTS" | "NAO_EXISTE" => Self::Empty,
            "NOT_EMPTY" | "NAO_VAZIO" | "EXISTS" | "EXISTE" => Self::NotEmpty,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Canonical code of this operator
    pub fn code(&self) -> &str {
        match self {
            Self::Equal => "EQUAL",
            Self::NotEqual => "NOT_EQUAL",
            Self::Greater => "GREATER",
            Self::Less => "LESS",
            Self::GreaterOrEqual => "GREATER_OR_EQUAL",
            Self::LessOrEqual => "LESS_OR_EQUAL",
            Self::In => "IN",
            Self::NotIn => "NOT_IN",
            Self::Contains => "CONTAINS",
            Self::StartsWith => "STARTS_WITH",
            Self::EndsWith => "ENDS_WITH",
            Self::Empty => "EMPTY",
            Self::NotEmpty => "NOT_EMPTY",
            Self::Unknown(code) => code,
        }
    }

    /// Check whether this operator is part of the supported vocabulary
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    /// Operators compared against the `values` list rather than `value`
    pub fn uses_value_list(&self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }
}

impl Default for Operator {
    fn default() -> Self {
        Self::Unknown(String::new())
    }
}

impl From<String> for Operator {
    fn from(code: String) -> Self {
        Self::from_code(&code)
    }
}

impl From<&str> for Operator {
    fn from(code: &str) -> Self {
        Self::from_code(code)
    }
}

impl From<Operator> for String {
    fn from(operator: Operator) -> Self {
        match operator {
            Operator::Unknown(code) => code,
            known => known.code().to_string(),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
