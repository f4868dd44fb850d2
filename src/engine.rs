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

//! Visibility engine - the main entry point for a rendering pass

use crate::context::EvaluationContext;
use crate::diagnostics::Diagnostic;
use crate::evaluator::evaluate_filter;
use crate::filter::Filter;
use crate::model::{ResolvedValueMap, ScalarValue, question_id_key};
use crate::registry::ContextResolverRegistry;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A question as seen by the engine: identity plus its optional rule
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QuestionRule {
    /// Numeric question id
    #[serde(alias = "seqPergunta")]
    pub id: i64,

    /// Stable business code
    #[serde(default, alias = "codigo", skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Visibility rule; `None` means always visible
    #[serde(default, alias = "filtro", skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
}

impl QuestionRule {
    /// Question without a rule
    pub fn new(id: i64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Set the business code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Set the visibility rule
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// Visibility decisions of one pass
#[derive(Debug, Clone, Serialize)]
pub struct VisibilityOutcome {
    /// Decision per question id, in question order
    pub visibility: IndexMap<i64, bool>,
    /// Value map the rules were evaluated against
    pub values: ResolvedValueMap,
    /// Diagnostics recorded on the context during the pass, from resolution
    /// and from evaluating the rules
    pub diagnostics: Vec<Diagnostic>,
}

impl VisibilityOutcome {
    /// Decision for a question; questions outside the pass are visible
    pub fn is_visible(&self, question_id: i64) -> bool {
        self.visibility.get(&question_id).copied().unwrap_or(true)
    }

    /// Ids of the visible questions, in question order
    pub fn visible_question_ids(&self) -> Vec<i64> {
        self.visibility
            .iter()
            .filter_map(|(id, visible)| visible.then_some(*id))
            .collect()
    }

    /// Keep the items whose question is visible
    pub fn filter_visible<T>(
        &self,
        items: impl IntoIterator<Item = T>,
        question_id: impl Fn(&T) -> i64,
    ) -> Vec<T> {
        items
            .into_iter()
            .filter(|item| self.is_visible(question_id(item)))
            .collect()
    }
}

/// Runs a full visibility pass: discover computed fields, resolve them once,
/// merge with answers and evaluate every rule
#[derive(Debug, Clone, Default)]
pub struct VisibilityEngine {
    registry: ContextResolverRegistry,
}

impl VisibilityEngine {
    /// Create an engine with the full computed-field catalogue
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine over a specific registry
    pub fn with_registry(registry: ContextResolverRegistry) -> Self {
        Self { registry }
    }

    /// Resolver registry in use
    pub fn registry(&self) -> &ContextResolverRegistry {
        &self.registry
    }

    /// Key submitted answers by `#<id>` and, when the question has one, by its code
    pub fn answers_by_question<I, V>(questions: &[QuestionRule], answers: I) -> ResolvedValueMap
    where
        I: IntoIterator<Item = (i64, V)>,
        V: Into<ScalarValue>,
    {
        let codes: IndexMap<i64, &str> = questions
            .iter()
            .filter_map(|question| question.code.as_deref().map(|code| (question.id, code)))
            .collect();

        let mut values = ResolvedValueMap::new();
        for (question_id, answer) in answers {
            let answer = answer.into();
            if let Some(code) = codes.get(&question_id) {
                values.insert(*code, answer.clone());
            }
            values.insert(question_id_key(question_id), answer);
        }
        values
    }

    /// Evaluate every question's rule against `answers` plus the computed
    /// fields the rules reference. Answers win when a key collides.
    pub async fn evaluate_questions(
        &self,
        questions: &[QuestionRule],
        answers: &ResolvedValueMap,
        ctx: &EvaluationContext,
    ) -> VisibilityOutcome {
        let codes = self
            .registry
            .referenced_codes(questions.iter().filter_map(|q| q.filter.as_ref()));
        log::debug!("Resolving {} computed fields for {} questions", codes.len(), questions.len());

        let computed = self.registry.resolve_many(codes, ctx).await;
        let mut values = answers.clone();
        values.merge_missing(computed);

        let visibility = questions
            .iter()
            .map(|question| {
                let mut diagnostics = Vec::new();
                let visible = evaluate_filter(question.filter.as_ref(), &values, &mut diagnostics);
                for mut diagnostic in diagnostics {
                    diagnostic.message = format!("Question {}: {}", question.id, diagnostic.message);
                    ctx.record(diagnostic);
                }
                (question.id, visible)
            })
            .collect();

        VisibilityOutcome {
            visibility,
            values,
            diagnostics: ctx.diagnostics(),
        }
    }
}
