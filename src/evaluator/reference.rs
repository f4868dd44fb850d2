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

//! Reference resolution for condition operands
//!
//! A condition may point at a question by numeric id, by stable code, or at a
//! computed field with or without the `EL_` prefix. Lookup order, first hit
//! wins:
//!
//! 1. `#<questionId>` when a question id is set
//! 2. `field` verbatim
//! 3. `EL_<field>`, even when `field` already carries the prefix
//! 4. `field` with the `EL_` prefix stripped, when it carries one

use crate::filter::Condition;
use crate::model::{COMPUTED_FIELD_PREFIX, ResolvedValueMap, ScalarValue, question_id_key};

/// Outcome of resolving a condition's reference
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedReference<'a> {
    /// Key that matched, if any
    pub key: Option<&'a str>,
    /// Value found under that key; `None` means absent
    pub value: Option<&'a ScalarValue>,
}

impl ResolvedReference<'_> {
    const ABSENT: Self = Self {
        key: None,
        value: None,
    };
}

/// Resolve the operand a condition refers to
pub fn resolve_reference<'a>(
    condition: &Condition,
    values: &'a ResolvedValueMap,
) -> ResolvedReference<'a> {
    let found = |key: &str| {
        values
            .get_key_value(key)
            .map(|(key, value)| ResolvedReference {
                key: Some(key),
                value: Some(value),
            })
    };

    if let Some(id) = condition.question_id {
        if let Some(hit) = found(&question_id_key(id)) {
            return hit;
        }
    }

    let Some(field) = condition.field.as_deref().filter(|f| !f.is_empty()) else {
        return ResolvedReference::ABSENT;
    };

    if let Some(hit) = found(field) {
        return hit;
    }

    found(&format!("{COMPUTED_FIELD_PREFIX}{field}"))
        .or_else(|| {
            field
                .strip_prefix(COMPUTED_FIELD_PREFIX)
                .and_then(|stripped| found(stripped))
        })
        .unwrap_or(ResolvedReference::ABSENT)
}
