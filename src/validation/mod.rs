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

//! Structural validation of authored condition trees
//!
//! Advisory only: used when a rule is saved, never during evaluation. Works
//! on untyped JSON so every problem in a tree is reported, not just the first
//! one serde would stop at.

use crate::filter::Operator;
use serde::Serialize;
use serde_json::{Map, Value};

/// Outcome of validating one tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// `true` when `errors` is empty
    pub valid: bool,
    /// Problems that make the rule unusable as authored
    pub errors: Vec<String>,
    /// Problems the evaluator tolerates (empty groups, unknown operators)
    pub warnings: Vec<String>,
}

impl ValidationReport {
    fn finish(mut self) -> Self {
        self.valid = self.errors.is_empty();
        self
    }
}

/// Look a key up in either vocabulary
fn member<'a>(object: &'a Map<String, Value>, key: &str, alias: &str) -> Option<&'a Value> {
    object.get(key).or_else(|| object.get(alias))
}

/// Validate an untyped condition tree. `null` (no rule) is valid.
pub fn validate_filter(value: &Value) -> ValidationReport {
    let mut report = ValidationReport::default();
    let object = match value {
        Value::Null => return report.finish(),
        Value::Object(object) => object,
        _ => {
            report.errors.push("Filter must be an object".to_string());
            return report.finish();
        }
    };

    check_logic(member(object, "logic", "logica"), "Filter", &mut report);

    let conditions = member(object, "conditions", "condicoes");
    let groups = member(object, "groups", "grupos");
    match (conditions, groups) {
        (None, None) => report
            .errors
            .push("Filter must have either \"conditions\" or \"groups\"".to_string()),
        (_, Some(groups)) => check_groups(groups, &mut report),
        (Some(conditions), None) => check_conditions(conditions, "Filter", &mut report),
    }

    report.finish()
}

fn check_logic(logic: Option<&Value>, location: &str, report: &mut ValidationReport) {
    match logic.and_then(Value::as_str) {
        Some("AND" | "OR") => {}
        Some(other) => report
            .errors
            .push(format!("{location}: logic must be AND or OR, got \"{other}\"")),
        None => report
            .errors
            .push(format!("{location}: logic must be AND or OR")),
    }
}

fn check_groups(groups: &Value, report: &mut ValidationReport) {
    let Some(groups) = groups.as_array() else {
        report.errors.push("\"groups\" must be an array".to_string());
        return;
    };
    if groups.is_empty() {
        report
            .warnings
            .push("Filter has no groups; the question is always visible".to_string());
    }

    for (index, group) in groups.iter().enumerate() {
        let location = format!("Group {}", index + 1);
        let Some(group) = group.as_object() else {
            report.errors.push(format!("{location}: must be an object"));
            continue;
        };
        check_logic(member(group, "logic", "logica"), &location, report);
        match member(group, "conditions", "condicoes") {
            Some(conditions) => check_conditions(conditions, &location, report),
            None => report
                .errors
                .push(format!("{location}: \"conditions\" must be an array")),
        }
    }
}

fn check_conditions(conditions: &Value, location: &str, report: &mut ValidationReport) {
    let Some(conditions) = conditions.as_array() else {
        report
            .errors
            .push(format!("{location}: \"conditions\" must be an array"));
        return;
    };
    if conditions.is_empty() {
        report
            .warnings
            .push(format!("{location}: no conditions; it always holds"));
    }

    for (index, condition) in conditions.iter().enumerate() {
        let location = format!("{location}, condition {}", index + 1);
        let Some(condition) = condition.as_object() else {
            report.errors.push(format!("{location}: must be an object"));
            continue;
        };

        let has_field = member(condition, "field", "campo")
            .and_then(Value::as_str)
            .is_some_and(|field| !field.is_empty());
        let has_question = member(condition, "questionId", "seqPergunta").is_some_and(Value::is_i64);
        if !has_field && !has_question {
            report
                .errors
                .push(format!("{location}: \"field\" or \"questionId\" is required"));
        }

        check_operands(condition, &location, report);

        let Some(code) = member(condition, "operator", "operador").and_then(Value::as_str) else {
            report
                .errors
                .push(format!("{location}: \"operator\" is required"));
            continue;
        };
        let operator = Operator::from_code(code);
        if !operator.is_known() {
            report.warnings.push(format!(
                "{location}: unknown operator \"{code}\"; the condition is always false"
            ));
        } else if operator.uses_value_list()
            && !member(condition, "values", "valores").is_some_and(Value::is_array)
        {
            report
                .warnings
                .push(format!("{location}: {operator} without a \"values\" list"));
        }
    }
}

/// Member types the evaluator cannot use; such a condition always evaluates to false
fn check_operands(condition: &Map<String, Value>, location: &str, report: &mut ValidationReport) {
    if member(condition, "questionId", "seqPergunta").is_some_and(|id| !id.is_null() && !id.is_i64()) {
        report
            .errors
            .push(format!("{location}: \"questionId\" must be an integer"));
    }

    if member(condition, "value", "valor").is_some_and(|value| value.is_array() || value.is_object()) {
        report
            .errors
            .push(format!("{location}: \"value\" must be a scalar"));
    }

    let scalars = |items: &Vec<Value>| items.iter().all(|item| !item.is_array() && !item.is_object());
    match member(condition, "values", "valores") {
        None | Some(Value::Null) => {}
        Some(Value::Array(items)) if scalars(items) => {}
        Some(_) => report
            .errors
            .push(format!("{location}: \"values\" must be an array of scalars")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_valid_grouped_filter() {
        let report = validate_filter(&json!({
            "logic": "OR",
            "groups": [
                {"logic": "AND", "conditions": [
                    {"field": "ESFERA", "operator": "EQUAL", "value": "ESTADUAL"},
                    {"questionId": 12, "operator": "IN", "values": ["A", "B"]}
                ]}
            ]
        }));
        assert_eq!(report, ValidationReport { valid: true, ..Default::default() });
    }

    #[test]
    fn test_null_is_valid() {
        assert!(validate_filter(&Value::Null).valid);
    }

    #[test]
    fn test_reports_every_problem() {
        let report = validate_filter(&json!({
            "logic": "XOR",
            "groups": [
                {"logic": "AND", "conditions": [{"operator": "EQUAL"}]},
                {"conditions": [{"field": "UF"}]},
                "nope"
            ]
        }));

        assert!(!report.valid);
        assert_eq!(
            report.errors,
            vec![
                "Filter: logic must be AND or OR, got \"XOR\"".to_string(),
                "Group 1, condition 1: \"field\" or \"questionId\" is required".to_string(),
                "Group 2: logic must be AND or OR".to_string(),
                "Group 2, condition 1: \"operator\" is required".to_string(),
                "Group 3: must be an object".to_string(),
            ]
        );
    }

    #[test]
    fn test_operand_types() {
        let report = validate_filter(&json!({
            "logic": "AND",
            "conditions": [
                {"field": "UF", "operator": "EQUAL", "value": {"a": 1}},
                {"field": "UF", "operator": "IN", "values": "SP"},
                {"field": "UF", "operator": "IN", "values": ["SP", ["RJ"]]},
                {"field": "UF", "questionId": "12", "operator": "EMPTY"},
                {"field": "UF", "operator": "EQUAL", "value": null, "values": null}
            ]
        }));

        assert_eq!(
            report.errors,
            vec![
                "Filter, condition 1: \"value\" must be a scalar".to_string(),
                "Filter, condition 2: \"values\" must be an array of scalars".to_string(),
                "Filter, condition 3: \"values\" must be an array of scalars".to_string(),
                "Filter, condition 4: \"questionId\" must be an integer".to_string(),
            ]
        );
    }

    #[test]
    fn test_missing_shape_and_non_object() {
        let report = validate_filter(&json!({"logic": "AND"}));
        assert_eq!(
            report.errors,
            vec!["Filter must have either \"conditions\" or \"groups\"".to_string()]
        );
        assert!(!validate_filter(&json!([1, 2])).valid);
    }

    #[test]
    fn test_warnings_do_not_invalidate() {
        let report = validate_filter(&json!({
            "logica": "E",
            "condicoes": []
        }));
        assert!(!report.valid);

        let report = validate_filter(&json!({
            "logic": "AND",
            "conditions": [
                {"field": "UF", "operator": "LIKE", "value": "SP"},
                {"field": "UF", "operator": "NOT_IN"}
            ]
        }));
        assert!(report.valid);
        assert_eq!(report.warnings.len(), 2);
        assert!(report.warnings[0].contains("unknown operator \"LIKE\""));
        assert!(report.warnings[1].contains("NOT_IN without"));
    }
}
