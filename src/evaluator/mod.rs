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

//! Condition tree evaluator
//!
//! Pure and synchronous: the evaluator reads an already fully resolved
//! [`ResolvedValueMap`] and never performs I/O. A missing tree means the
//! question is always shown. Groups and conditions are combined left to right
//! with short-circuiting; empty groups and empty condition lists hold
//! vacuously.
//!
//! ```rust
//! use form_visibility::{Condition, Filter, Logic, ResolvedValueMap, is_visible};
//!
//! let filter = Filter::flat(
//!     Logic::And,
//!     vec![Condition::field("UF", "EQUAL").with_value("SP")],
//! );
//! let values: ResolvedValueMap = [("EL_UF", "SP")].into_iter().collect();
//!
//! assert!(is_visible(Some(&filter), &values));
//! assert!(is_visible(None, &values));
//! ```

pub mod operators;
pub mod reference;

pub use reference::{ResolvedReference, resolve_reference};

use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::filter::{Condition, Filter, Group, Logic};
use crate::model::{ResolvedValueMap, ScalarValue};
use serde::Serialize;

/// Decide whether a question guarded by `filter` is shown. Diagnostics are
/// logged; use [`evaluate_filter`] to collect them.
pub fn is_visible(filter: Option<&Filter>, values: &ResolvedValueMap) -> bool {
    let mut diagnostics = Vec::new();
    let visible = evaluate_filter(filter, values, &mut diagnostics);
    for diagnostic in &diagnostics {
        diagnostic.log();
    }
    visible
}

/// Decide visibility, appending diagnostics to `diagnostics` instead of logging them
pub fn evaluate_filter(
    filter: Option<&Filter>,
    values: &ResolvedValueMap,
    diagnostics: &mut Vec<Diagnostic>,
) -> bool {
    match filter {
        None => true,
        Some(filter) => combine(filter.logic(), filter.groups(), |group| {
            evaluate_group(group, values, diagnostics)
        }),
    }
}

/// Evaluate one group against resolved values
pub fn evaluate_group(
    group: &Group,
    values: &ResolvedValueMap,
    diagnostics: &mut Vec<Diagnostic>,
) -> bool {
    combine(group.logic, &group.conditions, |condition| {
        evaluate_condition(condition, values, diagnostics)
    })
}

/// Evaluate one condition; problems with the rule become diagnostics, never errors
pub fn evaluate_condition(
    condition: &Condition,
    values: &ResolvedValueMap,
    diagnostics: &mut Vec<Diagnostic>,
) -> bool {
    let outcome = ConditionOutcome::evaluate(condition, values);
    diagnostics.extend(outcome.diagnostics);
    outcome.result
}

fn combine<T>(logic: Logic, items: &[T], mut eval: impl FnMut(&T) -> bool) -> bool {
    match logic {
        Logic::And => items.iter().all(|item| eval(item)),
        // an empty OR list is vacuously true as well
        Logic::Or => items.is_empty() || items.iter().any(|item| eval(item)),
    }
}

struct ConditionOutcome<'a> {
    result: bool,
    reference: ResolvedReference<'a>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> ConditionOutcome<'a> {
    fn evaluate(condition: &Condition, values: &'a ResolvedValueMap) -> Self {
        let mut diagnostics = Vec::new();
        let reference = resolve_reference(condition, values);

        if condition.is_malformed() {
            let problems: Vec<String> = condition.malformed.iter().map(ToString::to_string).collect();
            diagnostics.push(
                Diagnostic::warning(
                    DiagnosticCode::MalformedCondition,
                    format!("Malformed condition: {}", problems.join("; ")),
                )
                .with_subject(condition.reference_label()),
            );
            return Self {
                result: false,
                reference,
                diagnostics,
            };
        }

        if condition.question_id.is_none() && condition.field.as_deref().is_none_or(str::is_empty)
        {
            diagnostics.push(Diagnostic::warning(
                DiagnosticCode::MissingReference,
                "Condition has neither a field nor a question id",
            ));
        }

        let result = operators::apply(
            &condition.operator,
            reference.value,
            condition.value.as_ref(),
            condition.values.as_deref(),
        )
        .unwrap_or_else(|| {
            diagnostics.push(
                Diagnostic::warning(
                    DiagnosticCode::UnknownOperator,
                    format!("Unknown operator '{}'", condition.operator),
                )
                .with_subject(condition.reference_label()),
            );
            false
        });

        Self {
            result,
            reference,
            diagnostics,
        }
    }
}

/// Full, non-short-circuited account of one evaluation
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationTrace {
    /// Final decision; always equal to [`is_visible`] on the same input
    pub visible: bool,
    /// Combinator across groups
    pub logic: Logic,
    /// Per-group outcomes
    pub groups: Vec<GroupTrace>,
    /// Diagnostics raised while evaluating
    pub diagnostics: Vec<Diagnostic>,
}

/// Outcome of one group
#[derive(Debug, Clone, Serialize)]
pub struct GroupTrace {
    /// Combinator within the group
    pub logic: Logic,
    /// Group result
    pub result: bool,
    /// Per-condition outcomes
    pub conditions: Vec<ConditionTrace>,
}

/// Outcome of one condition
#[derive(Debug, Clone, Serialize)]
pub struct ConditionTrace {
    /// Reference as authored (`#id` or field)
    pub reference: String,
    /// Canonical operator code (unknown codes verbatim)
    pub operator: String,
    /// Key of the value map that matched
    pub resolved_key: Option<String>,
    /// Value found; `None` when absent
    pub resolved_value: Option<ScalarValue>,
    /// Condition result
    pub result: bool,
}

/// Evaluate every condition and report how the decision was reached
pub fn explain(filter: Option<&Filter>, values: &ResolvedValueMap) -> EvaluationTrace {
    let Some(filter) = filter else {
        return EvaluationTrace {
            visible: true,
            logic: Logic::default(),
            groups: Vec::new(),
            diagnostics: Vec::new(),
        };
    };

    let mut diagnostics = Vec::new();
    let groups: Vec<GroupTrace> = filter
        .groups()
        .iter()
        .map(|group| {
            let conditions: Vec<ConditionTrace> = group
                .conditions
                .iter()
                .map(|condition| {
                    let outcome = ConditionOutcome::evaluate(condition, values);
                    diagnostics.extend(outcome.diagnostics);
                    ConditionTrace {
                        reference: condition.reference_label(),
                        operator: condition.operator.to_string(),
                        resolved_key: outcome.reference.key.map(str::to_string),
                        resolved_value: outcome.reference.value.cloned(),
                        result: outcome.result,
                    }
                })
                .collect();
            GroupTrace {
                logic: group.logic,
                result: combine(group.logic, &conditions, |c| c.result),
                conditions,
            }
        })
        .collect();

    EvaluationTrace {
        visible: combine(filter.logic(), &groups, |g| g.result),
        logic: filter.logic(),
        groups,
        diagnostics,
    }
}
