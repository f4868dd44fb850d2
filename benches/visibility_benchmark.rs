use criterion::{Criterion, criterion_group, criterion_main};
use form_visibility::{Filter, ResolvedValueMap, explain, is_visible, validate_filter};
use serde_json::json;
use std::hint::black_box;

fn rule_json() -> serde_json::Value {
    json!({
        "logic": "OR",
        "groups": [
            {"logic": "AND", "conditions": [
                {"field": "ESFERA", "operator": "EQUAL", "value": "ESTADUAL"},
                {"field": "UF", "operator": "IN", "values": ["SP", "RJ", "MG", "RS"]},
                {"field": "NOME_TRIBUNAL", "operator": "CONTAINS", "value": "justiça"}
            ]},
            {"logic": "AND", "conditions": [
                {"field": "ESFERA", "operator": "EQUAL", "value": "FEDERAL"},
                {"questionId": 12, "operator": "GREATER_OR_EQUAL", "value": 10}
            ]},
            {"logic": "OR", "conditions": [
                {"field": "OBS", "operator": "NOT_EMPTY"},
                {"field": "ANO_REFERENCIA", "operator": "LESS", "value": 2020}
            ]}
        ]
    })
}

fn values() -> ResolvedValueMap {
    [
        ("EL_ESFERA", json!("ESTADUAL")),
        ("EL_UF", json!("RS")),
        ("EL_NOME_TRIBUNAL", json!("Tribunal de Justiça do Rio Grande do Sul")),
        ("EL_ANO_REFERENCIA", json!(2025)),
        ("#12", json!("7")),
    ]
    .into_iter()
    .filter_map(|(key, value)| form_visibility::ScalarValue::from_json(&value).map(|v| (key, v)))
    .collect()
}

fn benchmark_is_visible(c: &mut Criterion) {
    let filter = Filter::from_json(&rule_json()).unwrap();
    let values = values();

    c.bench_function("is_visible_grouped", |b| {
        b.iter(|| black_box(is_visible(black_box(filter.as_ref()), black_box(&values))))
    });

    c.bench_function("explain_grouped", |b| {
        b.iter(|| black_box(explain(black_box(filter.as_ref()), black_box(&values))))
    });
}

fn benchmark_parse_and_validate(c: &mut Criterion) {
    let raw = rule_json();
    let text = raw.to_string();

    let mut group = c.benchmark_group("authoring");
    group.bench_function("parse_filter", |b| {
        b.iter(|| black_box(Filter::from_json_str(black_box(&text))))
    });
    group.bench_function("validate_filter", |b| {
        b.iter(|| black_box(validate_filter(black_box(&raw))))
    });
    group.finish();
}

criterion_group!(benches, benchmark_is_visible, benchmark_parse_and_validate);
criterion_main!(benches);
