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

//! Visibility decisions over stored JSON rules

use form_visibility::{Filter, ResolvedValueMap, explain, is_visible};
use rstest::rstest;
use serde_json::{Value, json};

fn filter(value: Value) -> Filter {
    Filter::from_json(&value).unwrap().unwrap()
}

fn values(value: Value) -> ResolvedValueMap {
    ResolvedValueMap::from_json_object(value.as_object().unwrap())
}

fn single(condition: Value) -> Filter {
    filter(json!({"logic": "AND", "conditions": [condition]}))
}

fn jurisdiction() -> Filter {
    filter(json!({
        "logic": "OR",
        "groups": [
            {"logic": "AND", "conditions": [
                {"field": "ESFERA", "operator": "EQUAL", "value": "ESTADUAL"},
                {"field": "UF", "operator": "EQUAL", "value": "SP"}
            ]},
            {"logic": "AND", "conditions": [
                {"field": "ESFERA", "operator": "EQUAL", "value": "FEDERAL"}
            ]}
        ]
    }))
}

#[test]
fn no_rule_is_always_visible() {
    let empty = ResolvedValueMap::new();
    assert!(is_visible(None, &empty));
    assert!(is_visible(None, &values(json!({"UF": "SP"}))));
    assert!(Filter::from_json(&Value::Null).unwrap().is_none());
}

#[test]
fn second_group_alone_satisfies_or() {
    assert!(is_visible(
        Some(&jurisdiction()),
        &values(json!({"ESFERA": "FEDERAL", "UF": "RJ"}))
    ));
}

#[test]
fn no_group_satisfied_hides() {
    assert!(!is_visible(
        Some(&jurisdiction()),
        &values(json!({"ESFERA": "ESTADUAL", "UF": "MG"}))
    ));
}

#[test]
fn computed_field_prefix_fallback() {
    let rule = single(json!({"field": "UF", "operator": "EQUAL", "value": "SP"}));
    assert!(is_visible(Some(&rule), &values(json!({"EL_UF": "SP"}))));

    let prefixed = single(json!({"field": "EL_UF", "operator": "EQUAL", "value": "SP"}));
    assert!(is_visible(Some(&prefixed), &values(json!({"UF": "SP"}))));
}

#[test]
fn question_id_reference() {
    let rule = single(json!({"questionId": 12, "operator": "GREATER", "value": 5}));
    assert!(is_visible(Some(&rule), &values(json!({"#12": "10"}))));
    assert!(!is_visible(Some(&rule), &values(json!({"#12": "3"}))));
}

#[test]
fn flat_and_normalized_forms_agree() {
    let flat = filter(json!({
        "logic": "OR",
        "conditions": [
            {"field": "UF", "operator": "EQUAL", "value": "SP"},
            {"field": "PORTE", "operator": "IN", "values": ["GRANDE", "MEDIO"]}
        ]
    }));
    let grouped = flat.clone().normalize();

    for map in [
        json!({"UF": "SP"}),
        json!({"UF": "RJ", "PORTE": "MEDIO"}),
        json!({"UF": "RJ", "PORTE": "PEQUENO"}),
        json!({}),
    ] {
        let map = values(map);
        assert_eq!(is_visible(Some(&flat), &map), is_visible(Some(&grouped), &map));
    }
}

#[rstest]
#[case::equal_number_vs_string(json!({"field": "X", "operator": "EQUAL", "value": "5"}), json!({"X": 5}), true)]
#[case::equal_is_case_sensitive(json!({"field": "X", "operator": "EQUAL", "value": "sp"}), json!({"X": "SP"}), false)]
#[case::not_equal(json!({"field": "X", "operator": "NOT_EQUAL", "value": "SP"}), json!({"X": "RJ"}), true)]
#[case::greater_numeric_strings(json!({"field": "X", "operator": "GREATER", "value": "9"}), json!({"X": "10"}), true)]
#[case::greater_non_numeric(json!({"field": "X", "operator": "GREATER", "value": 1}), json!({"X": "abc"}), false)]
#[case::less_non_numeric_operand(json!({"field": "X", "operator": "LESS", "value": "abc"}), json!({"X": 1}), false)]
#[case::less_or_equal_absent(json!({"field": "X", "operator": "LESS_OR_EQUAL", "value": 1}), json!({}), false)]
#[case::greater_or_equal_null_is_zero(json!({"field": "X", "operator": "GREATER_OR_EQUAL", "value": 0}), json!({"X": null}), true)]
#[case::in_absent_values(json!({"field": "X", "operator": "IN"}), json!({"X": "A"}), false)]
#[case::not_in_absent_values(json!({"field": "X", "operator": "NOT_IN"}), json!({"X": "A"}), true)]
#[case::in_list(json!({"field": "X", "operator": "IN", "values": ["A", "B"]}), json!({"X": "B"}), true)]
#[case::not_in_list(json!({"field": "X", "operator": "NOT_IN", "values": ["A", "B"]}), json!({"X": "B"}), false)]
#[case::contains_case_insensitive(json!({"field": "NOME", "operator": "CONTAINS", "value": "trib"}), json!({"NOME": "Tribunal Regional"}), true)]
#[case::contains_absent(json!({"field": "NOME", "operator": "CONTAINS", "value": "trib"}), json!({}), false)]
#[case::starts_with(json!({"field": "NOME", "operator": "STARTS_WITH", "value": "TRIBUNAL"}), json!({"NOME": "Tribunal Regional"}), true)]
#[case::ends_with(json!({"field": "NOME", "operator": "ENDS_WITH", "value": "federal"}), json!({"NOME": "Tribunal Regional"}), false)]
#[case::empty_absent_key(json!({"field": "OBS", "operator": "EMPTY"}), json!({}), true)]
#[case::empty_blank(json!({"field": "OBS", "operator": "EMPTY"}), json!({"OBS": ""}), true)]
#[case::not_empty(json!({"field": "OBS", "operator": "NOT_EMPTY"}), json!({"OBS": "x"}), true)]
#[case::unknown_operator(json!({"field": "X", "operator": "LIKE", "value": "A"}), json!({"X": "A"}), false)]
#[case::portuguese_alias(json!({"campo": "X", "operador": "DIFERENTE", "valor": "A"}), json!({"X": "B"}), true)]
#[case::exists_alias(json!({"field": "X", "operator": "EXISTE"}), json!({"X": 0}), true)]
#[case::not_contains_is_set_exclusion(json!({"field": "X", "operator": "NAO_CONTEM", "values": ["A"]}), json!({"X": "AB"}), true)]
fn operator_semantics(#[case] condition: Value, #[case] map: Value, #[case] expected: bool) {
    assert_eq!(is_visible(Some(&single(condition)), &values(map)), expected);
}

// Empty groups are vacuously true so a half-authored rule never hides a
// question. Existing rules depend on this; keep it.
#[rstest]
#[case(json!({"logic": "AND", "conditions": []}))]
#[case(json!({"logic": "OR", "conditions": []}))]
#[case(json!({"logic": "OR", "groups": []}))]
#[case(json!({"logic": "AND", "groups": [{"logic": "OR", "conditions": []}]}))]
fn empty_rules_are_vacuously_visible(#[case] rule: Value) {
    assert!(is_visible(Some(&filter(rule)), &ResolvedValueMap::new()));
}

#[test]
fn trace_agrees_with_decision() {
    let rule = jurisdiction();
    for map in [
        json!({"ESFERA": "FEDERAL"}),
        json!({"EL_ESFERA": "ESTADUAL", "EL_UF": "SP"}),
        json!({"ESFERA": "ESTADUAL", "UF": "MG"}),
    ] {
        let map = values(map);
        let trace = explain(Some(&rule), &map);
        assert_eq!(trace.visible, is_visible(Some(&rule), &map));
        assert_eq!(trace.groups.len(), 2);
    }
}

#[test]
fn non_object_trees_are_rejected() {
    assert!(Filter::from_json(&json!("AND")).is_err());
    assert!(Filter::from_json(&json!([{"logic": "AND"}])).is_err());
}

#[rstest]
#[case::object_operand(json!({"field": "UF", "operator": "NOT_EQUAL", "value": {"a": 1}}))]
#[case::array_operand(json!({"field": "UF", "operator": "NOT_EQUAL", "value": ["RJ"]}))]
#[case::scalar_values(json!({"field": "UF", "operator": "NOT_IN", "values": "RJ"}))]
#[case::nested_values(json!({"field": "UF", "operator": "NOT_IN", "values": [["RJ"]]}))]
#[case::unreadable_question_id(json!({"questionId": "doze", "operator": "EMPTY"}))]
#[case::numeric_operator(json!({"field": "UF", "operator": 1}))]
#[case::not_an_object(json!("UF EQUAL SP"))]
fn malformed_condition_hides_the_question(#[case] condition: Value) {
    let map = values(json!({"UF": "SP"}));
    let rule = single(condition);
    assert!(!is_visible(Some(&rule), &map));
    assert!(!explain(Some(&rule), &map).visible);
}

#[test]
fn unrecognised_logic_combines_with_and() {
    let rule = filter(json!({
        "logic": "NOR",
        "groups": [
            {"logic": "AND", "conditions": [{"field": "UF", "operator": "EQUAL", "value": "SP"}]},
            {"logic": "AND", "conditions": [{"field": "UF", "operator": "EQUAL", "value": "RJ"}]}
        ]
    }));
    assert!(!is_visible(Some(&rule), &values(json!({"UF": "SP"}))));

    let rule = filter(json!({"logic": "and", "conditions": [
        {"field": "UF", "operator": "EQUAL", "value": "SP"},
        {"field": "ESFERA", "operator": "EQUAL", "value": "ESTADUAL"}
    ]}));
    assert!(is_visible(Some(&rule), &values(json!({"UF": "SP", "ESFERA": "ESTADUAL"}))));
    assert!(!is_visible(Some(&rule), &values(json!({"UF": "SP", "ESFERA": "FEDERAL"}))));
}

#[test]
fn prefixed_field_tries_double_prefix_first() {
    let rule = single(json!({"field": "EL_UF", "operator": "EQUAL", "value": "SP"}));
    assert!(is_visible(Some(&rule), &values(json!({"EL_EL_UF": "SP", "UF": "RJ"}))));
    assert!(is_visible(Some(&rule), &values(json!({"UF": "SP"}))));
}

#[test]
fn large_and_small_numbers_compare_in_exponent_form() {
    let rule = single(json!({"field": "X", "operator": "EQUAL", "value": "1e+21"}));
    assert!(is_visible(Some(&rule), &values(json!({"X": 1e21}))));

    let rule = single(json!({"field": "X", "operator": "EQUAL", "value": "1e-7"}));
    assert!(is_visible(Some(&rule), &values(json!({"X": 0.0000001}))));
}
