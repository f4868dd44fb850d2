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

//! Diagnostics recorded while resolving and evaluating visibility rules
//!
//! Nothing in the engine fails a render pass because of authored data. Unknown
//! operators, unknown computed-field codes and resolver failures are turned into
//! [`Diagnostic`]s instead, logged through the `log` facade and kept on the
//! evaluation context so operators can fix the offending rules.

use serde::Serialize;
use std::fmt;

/// Diagnostic severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub enum Severity {
    /// Information - provides helpful information
    #[default]
    Info,
    /// Warning - an authored rule degraded to a safe default
    Warning,
    /// Error - a lookup failed and its value was replaced by null
    Error,
}

/// Diagnostic codes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum DiagnosticCode {
    /// Operator code not in the supported vocabulary
    UnknownOperator,
    /// Computed-field code not registered
    UnknownComputedField,
    /// A resolver failed (remote lookup error or aborted task)
    ResolverFailure,
    /// Condition names neither a field nor a question id
    MissingReference,
    /// A condition member was stored with an unusable JSON type
    MalformedCondition,
    /// Custom diagnostic with a string code
    Custom(String),
}

/// A diagnostic message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Severity of the diagnostic
    pub severity: Severity,
    /// Diagnostic code
    pub code: DiagnosticCode,
    /// Human-readable message
    pub message: String,
    /// Rule or computed-field the diagnostic is about
    pub subject: Option<String>,
    /// Simple contextual help message
    pub help: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        let help = Self::generate_help(&code);
        Self {
            severity,
            code,
            message: message.into(),
            subject: None,
            help,
        }
    }

    /// Create a warning diagnostic
    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Warning, message)
    }

    /// Create an error diagnostic
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Error, message)
    }

    /// Attach the rule element or code this diagnostic refers to
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    fn generate_help(code: &DiagnosticCode) -> Option<String> {
        match code {
            DiagnosticCode::UnknownOperator => Some(
                "The condition evaluates to false; use one of EQUAL, NOT_EQUAL, GREATER, LESS, \
                 GREATER_OR_EQUAL, LESS_OR_EQUAL, IN, NOT_IN, CONTAINS, STARTS_WITH, ENDS_WITH, \
                 EMPTY, NOT_EMPTY"
                    .to_string(),
            ),
            DiagnosticCode::UnknownComputedField => {
                Some("Check the code spelling against the registered computed fields".to_string())
            }
            DiagnosticCode::ResolverFailure => {
                Some("The field resolved to null; check the directory service".to_string())
            }
            DiagnosticCode::MissingReference => {
                Some("Set either \"field\" or \"questionId\" on the condition".to_string())
            }
            DiagnosticCode::MalformedCondition => Some(
                "The condition evaluates to false; \"value\" must be a scalar, \"values\" an \
                 array of scalars and \"questionId\" an integer"
                    .to_string(),
            ),
            DiagnosticCode::Custom(_) => None,
        }
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Emit this diagnostic through the `log` facade
    pub fn log(&self) {
        match self.severity {
            Severity::Error => log::error!("{self}"),
            Severity::Warning => log::warn!("{self}"),
            Severity::Info => log::info!("{self}"),
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOperator => write!(f, "unknown_operator"),
            Self::UnknownComputedField => write!(f, "unknown_computed_field"),
            Self::ResolverFailure => write!(f, "resolver_failure"),
            Self::MissingReference => write!(f, "missing_reference"),
            Self::MalformedCondition => write!(f, "malformed_condition"),
            Self::Custom(code) => write!(f, "{code}"),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(subject) = &self.subject {
            write!(f, " ({subject})")?;
        }
        Ok(())
    }
}
