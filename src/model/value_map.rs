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

//! Resolved value map consulted by the condition evaluator

use super::value::ScalarValue;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Prefix used for numeric question-id references (`#42`)
pub const QUESTION_ID_PREFIX: char = '#';

/// Naming convention prefix of computed-field codes (`EL_UF`)
pub const COMPUTED_FIELD_PREFIX: &str = "EL_";

/// Build the reference key for a numeric question id
pub fn question_id_key(question_id: i64) -> String {
    format!("{QUESTION_ID_PREFIX}{question_id}")
}

/// Merged map of submitted answers and resolved computed fields.
///
/// Keys are question codes, `#<questionId>` references or computed-field
/// codes. An absent key and a key mapped to [`ScalarValue::Null`] are distinct.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolvedValueMap {
    values: FxHashMap<String, ScalarValue>,
}

impl ResolvedValueMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ScalarValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Insert an answer addressed by numeric question id
    pub fn insert_question_id(&mut self, question_id: i64, value: impl Into<ScalarValue>) {
        self.values.insert(question_id_key(question_id), value.into());
    }

    /// Insert only when the key is not already present. Returns whether the
    /// value was stored.
    pub fn insert_if_absent(&mut self, key: impl Into<String>, value: impl Into<ScalarValue>) -> bool {
        let key = key.into();
        if self.values.contains_key(&key) {
            return false;
        }
        self.values.insert(key, value.into());
        true
    }

    /// Look up a key
    pub fn get(&self, key: &str) -> Option<&ScalarValue> {
        self.values.get(key)
    }

    /// Look up a key, returning the stored key alongside the value
    pub fn get_key_value(&self, key: &str) -> Option<(&str, &ScalarValue)> {
        self.values.get_key_value(key).map(|(k, v)| (k.as_str(), v))
    }

    /// Check whether a key is present (possibly mapped to null)
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the map has no entries
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over entries in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScalarValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merge entries whose keys are not yet present; existing entries win
    pub fn merge_missing<I, K, V>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ScalarValue>,
    {
        for (key, value) in entries {
            self.insert_if_absent(key, value);
        }
    }

    /// Build a map from a JSON object, skipping non-scalar members
    pub fn from_json_object(object: &serde_json::Map<String, serde_json::Value>) -> Self {
        object
            .iter()
            .filter_map(|(key, value)| {
                let scalar = ScalarValue::from_json(value);
                if scalar.is_none() {
                    log::warn!("Ignoring non-scalar value for key '{key}'");
                }
                scalar.map(|v| (key.clone(), v))
            })
            .collect()
    }
}

impl<K: Into<String>, V: Into<ScalarValue>> FromIterator<(K, V)> for ResolvedValueMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K: Into<String>, V: Into<ScalarValue>> Extend<(K, V)> for ResolvedValueMap {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}
