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

//! Operator semantics
//!
//! `actual` is the resolved operand (`None` when the reference is absent),
//! `expected` the condition's `value` and `expected_list` its `values`.

use crate::filter::Operator;
use crate::model::ScalarValue;
use crate::model::value::{numeric, stringify};

/// Apply an operator. Returns `None` for operators outside the vocabulary.
pub fn apply(
    operator: &Operator,
    actual: Option<&ScalarValue>,
    expected: Option<&ScalarValue>,
    expected_list: Option<&[ScalarValue]>,
) -> Option<bool> {
    let result = match operator {
        Operator::Equal => equal(actual, expected),
        Operator::NotEqual => !equal(actual, expected),
        Operator::Greater => compare(actual, expected, |a, b| a > b),
        Operator::Less => compare(actual, expected, |a, b| a < b),
        Operator::GreaterOrEqual => compare(actual, expected, |a, b| a >= b),
        Operator::LessOrEqual => compare(actual, expected, |a, b| a <= b),
        // absent list: nothing matches
        Operator::In => expected_list.is_some_and(|list| member(actual, list)),
        // absent list: nothing excludes
        Operator::NotIn => expected_list.is_none_or(|list| !member(actual, list)),
        Operator::Contains => text_match(actual, expected, |a, b| a.contains(b)),
        Operator::StartsWith => text_match(actual, expected, |a, b| a.starts_with(b)),
        Operator::EndsWith => text_match(actual, expected, |a, b| a.ends_with(b)),
        Operator::Empty => is_empty(actual),
        Operator::NotEmpty => !is_empty(actual),
        Operator::Unknown(_) => return None,
    };
    Some(result)
}

fn equal(actual: Option<&ScalarValue>, expected: Option<&ScalarValue>) -> bool {
    stringify(actual) == stringify(expected)
}

fn compare(
    actual: Option<&ScalarValue>,
    expected: Option<&ScalarValue>,
    cmp: impl Fn(f64, f64) -> bool,
) -> bool {
    let (a, b) = (numeric(actual), numeric(expected));
    if a.is_nan() || b.is_nan() {
        return false;
    }
    cmp(a, b)
}

fn member(actual: Option<&ScalarValue>, list: &[ScalarValue]) -> bool {
    let needle = stringify(actual);
    list.iter().any(|candidate| candidate.to_string_value() == needle)
}

fn text_match(
    actual: Option<&ScalarValue>,
    expected: Option<&ScalarValue>,
    matcher: impl Fn(&str, &str) -> bool,
) -> bool {
    match (actual, expected) {
        (Some(a), Some(b)) if !a.is_null() && !b.is_null() => matcher(
            &a.to_string_value().to_lowercase(),
            &b.to_string_value().to_lowercase(),
        ),
        _ => false,
    }
}

fn is_empty(actual: Option<&ScalarValue>) -> bool {
    actual.is_none_or(ScalarValue::is_blank)
}
