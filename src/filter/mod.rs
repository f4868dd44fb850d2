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

//! Condition trees ("filters") controlling question visibility
//!
//! A filter is stored either flat (`{ logic, conditions }`) or grouped
//! (`{ logic, groups: [{ logic, conditions }] }`). Both deserialize into
//! [`Filter`]; the flat shape is kept as a single borrowed group so the
//! evaluator only ever sees groups.
//!
//! Intake is lenient. A member of the wrong JSON type never rejects the tree:
//! it is kept on the condition as a [`MalformedMember`] and that condition
//! evaluates to false. An unrecognised `logic` combines with AND.

pub mod operator;

pub use operator::Operator;

use crate::model::ScalarValue;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Result type for filter parsing
pub type FilterResult<T> = Result<T, FilterError>;

/// Errors raised when a stored filter cannot be turned into a tree at all
#[derive(Error, Debug)]
pub enum FilterError {
    /// The stored value is neither null nor a JSON object
    #[error("Filter must be a JSON object, got {found}")]
    NotAnObject {
        /// JSON type that was found
        found: &'static str,
    },

    /// The stored text is not JSON
    #[error("Invalid filter JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Boolean combinator for groups and conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Logic {
    /// Every member must hold
    #[default]
    And,
    /// At least one member must hold
    Or,
}

impl Logic {
    /// Read a stored combinator. Only `OR` selects disjunction; a missing,
    /// null or unrecognised value combines with AND.
    pub fn from_stored(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(code)) if code == "OR" => Self::Or,
            Some(Value::String(code)) if code == "AND" => Self::And,
            None | Some(Value::Null) => Self::And,
            Some(other) => {
                log::warn!("Unrecognised logic {other}; combining with AND");
                Self::And
            }
        }
    }
}

impl<'de> Deserialize<'de> for Logic {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_stored(Some(&value)))
    }
}

impl fmt::Display for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => f.write_str("AND"),
            Self::Or => f.write_str("OR"),
        }
    }
}

/// A stored member a condition cannot use, kept verbatim
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedMember {
    /// Canonical member name (`value`, `questionId`, ...). `condition`,
    /// `group` and `filter` mark a whole entry that is not an object.
    pub member: &'static str,
    /// JSON found in the rule
    pub found: Value,
}

impl MalformedMember {
    fn new(member: &'static str, found: Value) -> Self {
        Self { member, found }
    }

    /// Whether the whole stored entry, not one member, is unusable
    pub fn is_whole_entry(&self) -> bool {
        matches!(self.member, "condition" | "group" | "filter")
    }
}

impl fmt::Display for MalformedMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let found = match &self.found {
            Value::Null => "null",
            Value::Bool(_) => "a boolean",
            Value::Number(_) => "a number",
            Value::String(_) => "a string",
            Value::Array(_) => "an array",
            Value::Object(_) => "an object",
        };
        if self.is_whole_entry() {
            write!(f, "{} cannot be {found}", self.member)
        } else {
            write!(f, "\"{}\" cannot be {found}", self.member)
        }
    }
}

/// Look a member up in either vocabulary
fn member(object: &Map<String, Value>, key: &str, alias: &str) -> Option<Value> {
    object.get(key).or_else(|| object.get(alias)).cloned()
}

/// A single comparison against a referenced answer or computed field
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Condition {
    /// Question code or computed-field code
    pub field: Option<String>,

    /// Numeric question id; takes priority over `field`
    pub question_id: Option<i64>,

    /// Operator code
    pub operator: Operator,

    /// Operand of unary and binary comparisons. An explicit JSON `null` is
    /// kept as `Some(ScalarValue::Null)`.
    pub value: Option<ScalarValue>,

    /// Operand list of set-membership operators
    pub values: Option<Vec<ScalarValue>>,

    /// Members stored with a JSON type the condition cannot use. A condition
    /// with any of these evaluates to false.
    pub malformed: Vec<MalformedMember>,
}

impl Condition {
    /// Condition referencing a field by code
    pub fn field(field: impl Into<String>, operator: impl Into<Operator>) -> Self {
        Self {
            field: Some(field.into()),
            operator: operator.into(),
            ..Self::default()
        }
    }

    /// Condition referencing a question by numeric id
    pub fn question(question_id: i64, operator: impl Into<Operator>) -> Self {
        Self {
            question_id: Some(question_id),
            operator: operator.into(),
            ..Self::default()
        }
    }

    fn unusable(member: &'static str, found: Value) -> Self {
        Self {
            malformed: vec![MalformedMember::new(member, found)],
            ..Self::default()
        }
    }

    /// Set the comparison operand
    pub fn with_value(mut self, value: impl Into<ScalarValue>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Set the membership operand list
    pub fn with_values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ScalarValue>,
    {
        self.values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Check whether any stored member had an unusable JSON type
    pub fn is_malformed(&self) -> bool {
        !self.malformed.is_empty()
    }

    /// Human-readable reference used in diagnostics
    pub fn reference_label(&self) -> String {
        match (&self.question_id, &self.field) {
            (Some(id), _) => crate::model::question_id_key(*id),
            (None, Some(field)) => field.clone(),
            (None, None) => "<no reference>".to_string(),
        }
    }

    /// Read a stored condition in either vocabulary
    pub fn from_stored(raw: Value) -> Self {
        let object = match raw {
            Value::Object(object) => object,
            other => return Self::unusable("condition", other),
        };
        let mut condition = Self::default();

        match member(&object, "field", "campo") {
            None | Some(Value::Null) => {}
            Some(Value::String(field)) => condition.field = Some(field),
            Some(other) => condition.reject("field", other),
        }

        match member(&object, "questionId", "seqPergunta") {
            None | Some(Value::Null) => {}
            Some(found) => match stored_question_id(&found) {
                Some(id) => condition.question_id = Some(id),
                None => condition.reject("questionId", found),
            },
        }

        match member(&object, "operator", "operador") {
            None | Some(Value::Null) => {}
            Some(Value::String(code)) => condition.operator = Operator::from_code(&code),
            Some(other) => condition.reject("operator", other),
        }

        if let Some(found) = member(&object, "value", "valor") {
            match ScalarValue::from_json(&found) {
                Some(value) => condition.value = Some(value),
                None => condition.reject("value", found),
            }
        }

        match member(&object, "values", "valores") {
            None | Some(Value::Null) => {}
            Some(Value::Array(items)) => {
                let values: Option<Vec<ScalarValue>> =
                    items.iter().map(ScalarValue::from_json).collect();
                match values {
                    Some(values) => condition.values = Some(values),
                    None => condition.reject("values", Value::Array(items)),
                }
            }
            Some(other) => condition.reject("values", other),
        }

        condition
    }

    fn reject(&mut self, member: &'static str, found: Value) {
        self.malformed.push(MalformedMember::new(member, found));
    }

    /// Stored JSON form with canonical keys; malformed members are written back verbatim
    pub fn to_stored(&self) -> Value {
        if let Some(whole) = self.malformed.iter().find(|m| m.is_whole_entry()) {
            return whole.found.clone();
        }

        let mut object = Map::new();
        if let Some(field) = &self.field {
            object.insert("field".to_string(), Value::String(field.clone()));
        }
        if let Some(id) = self.question_id {
            object.insert("questionId".to_string(), Value::from(id));
        }
        if self.operator != Operator::default() {
            object.insert("operator".to_string(), Value::String(self.operator.code().to_string()));
        }
        if let Some(value) = &self.value {
            object.insert("value".to_string(), value.clone().into());
        }
        if let Some(values) = &self.values {
            let values = values.iter().cloned().map(Value::from).collect();
            object.insert("values".to_string(), Value::Array(values));
        }
        for malformed in &self.malformed {
            object.insert(malformed.member.to_string(), malformed.found.clone());
        }
        Value::Object(object)
    }
}

/// Integer ids, integral floats and numeric strings all name a question
fn stored_question_id(found: &Value) -> Option<i64> {
    match found {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() <= 9_007_199_254_740_991.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from_stored)
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_stored().serialize(serializer)
    }
}

/// Stored condition list; anything but an array becomes one unusable condition
fn stored_conditions(found: Option<Value>) -> Vec<Condition> {
    match found {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.into_iter().map(Condition::from_stored).collect(),
        Some(other) => vec![Condition::unusable("conditions", other)],
    }
}

/// Conditions combined with a single logic
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Group {
    /// Combinator for `conditions`
    pub logic: Logic,

    /// Member conditions; an empty list is vacuously true
    pub conditions: Vec<Condition>,
}

impl Group {
    /// Create a group
    pub fn new(logic: Logic, conditions: Vec<Condition>) -> Self {
        Self { logic, conditions }
    }

    /// Read a stored group in either vocabulary
    pub fn from_stored(raw: Value) -> Self {
        match raw {
            Value::Object(object) => Self::new(
                Logic::from_stored(member(&object, "logic", "logica").as_ref()),
                stored_conditions(member(&object, "conditions", "condicoes")),
            ),
            other => Self::new(Logic::And, vec![Condition::unusable("group", other)]),
        }
    }

    /// Stored JSON form with canonical keys
    pub fn to_stored(&self) -> Value {
        let mut object = Map::new();
        object.insert("logic".to_string(), Value::String(self.logic.to_string()));
        object.insert(
            "conditions".to_string(),
            self.conditions.iter().map(Condition::to_stored).collect(),
        );
        Value::Object(object)
    }
}

impl Serialize for Group {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_stored().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Group {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from_stored)
    }
}

/// A visibility rule in either stored shape
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `{ logic, conditions }` - a single implicit group
    Flat(Group),
    /// `{ logic, groups }`
    Grouped {
        /// Combinator across groups
        logic: Logic,
        /// Member groups
        groups: Vec<Group>,
    },
}

impl Filter {
    /// Flat filter over a single implicit group
    pub fn flat(logic: Logic, conditions: Vec<Condition>) -> Self {
        Filter::Flat(Group::new(logic, conditions))
    }

    /// Grouped filter
    pub fn grouped(logic: Logic, groups: Vec<Group>) -> Self {
        Filter::Grouped { logic, groups }
    }

    /// Parse a stored filter. `null` means "no rule" and yields `Ok(None)`;
    /// any other non-object is an error. Objects always parse.
    pub fn from_json(value: &Value) -> FilterResult<Option<Filter>> {
        match value {
            Value::Null => Ok(None),
            Value::Object(_) => Ok(Some(Filter::from_stored(value.clone()))),
            Value::Bool(_) => Err(FilterError::NotAnObject { found: "boolean" }),
            Value::Number(_) => Err(FilterError::NotAnObject { found: "number" }),
            Value::String(_) => Err(FilterError::NotAnObject { found: "string" }),
            Value::Array(_) => Err(FilterError::NotAnObject { found: "array" }),
        }
    }

    /// Parse a stored filter from JSON text
    pub fn from_json_str(text: &str) -> FilterResult<Option<Filter>> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_json(&value)
    }

    /// Read a stored filter without failing. A non-object becomes a filter
    /// that never holds, so the question it guards stays hidden.
    pub fn from_stored(raw: Value) -> Self {
        let object = match raw {
            Value::Object(object) => object,
            other => {
                log::warn!("Visibility rule is not an object; the question stays hidden");
                return Filter::flat(Logic::And, vec![Condition::unusable("filter", other)]);
            }
        };

        let logic = Logic::from_stored(member(&object, "logic", "logica").as_ref());
        // grouped shape wins when both keys are present
        match member(&object, "groups", "grupos") {
            None | Some(Value::Null) => match member(&object, "conditions", "condicoes") {
                None | Some(Value::Null) => Filter::grouped(logic, Vec::new()),
                conditions => Filter::flat(logic, stored_conditions(conditions)),
            },
            Some(Value::Array(groups)) => {
                Filter::grouped(logic, groups.into_iter().map(Group::from_stored).collect())
            }
            Some(other) => Filter::grouped(
                logic,
                vec![Group::new(Logic::And, vec![Condition::unusable("groups", other)])],
            ),
        }
    }

    /// Combinator across groups
    pub fn logic(&self) -> Logic {
        match self {
            Filter::Flat(group) => group.logic,
            Filter::Grouped { logic, .. } => *logic,
        }
    }

    /// Groups of the normalized form; a flat filter yields its single group
    pub fn groups(&self) -> &[Group] {
        match self {
            Filter::Flat(group) => std::slice::from_ref(group),
            Filter::Grouped { groups, .. } => groups,
        }
    }

    /// Check whether the filter was stored in the flat shape
    pub fn is_flat(&self) -> bool {
        matches!(self, Filter::Flat(_))
    }

    /// Rewrite into the grouped shape: one group, same logic, verbatim conditions
    pub fn normalize(self) -> Filter {
        match self {
            Filter::Flat(group) => Filter::Grouped {
                logic: group.logic,
                groups: vec![group],
            },
            grouped => grouped,
        }
    }

    /// Every condition in the tree, group by group
    pub fn conditions(&self) -> impl Iterator<Item = &Condition> {
        self.groups().iter().flat_map(|group| group.conditions.iter())
    }

    /// Field names referenced anywhere in the tree
    pub fn referenced_fields(&self) -> impl Iterator<Item = &str> {
        self.conditions()
            .filter_map(|condition| condition.field.as_deref())
    }

    /// Stored JSON form, keeping the shape it was read in
    pub fn to_stored(&self) -> Value {
        match self {
            Filter::Flat(group) => group.to_stored(),
            Filter::Grouped { logic, groups } => {
                let mut object = Map::new();
                object.insert("logic".to_string(), Value::String(logic.to_string()));
                object.insert("groups".to_string(), groups.iter().map(Group::to_stored).collect());
                Value::Object(object)
            }
        }
    }
}

impl<'de> Deserialize<'de> for Filter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from_stored)
    }
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_stored().serialize(serializer)
    }
}
