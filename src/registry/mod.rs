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

//! Context resolver registry
//!
//! Maps computed-field codes to their resolvers. The mapping is fixed at
//! compile time through [`ComputedField`]; the registry adds lookup by code,
//! never-failing resolution and concurrent batch resolution.

#![warn(missing_docs)]

pub mod computed_field;

pub use computed_field::{ComputedField, FieldSource, ResolveError};

use crate::context::EvaluationContext;
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::filter::Filter;
use crate::model::ScalarValue;
use futures::future::join_all;
use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHashMap;
use std::sync::LazyLock;

static STANDARD: LazyLock<ContextResolverRegistry> = LazyLock::new(ContextResolverRegistry::new);

/// Registry of computed-field resolvers
#[derive(Debug, Clone)]
pub struct ContextResolverRegistry {
    fields: FxHashMap<&'static str, ComputedField>,
}

impl Default for ContextResolverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextResolverRegistry {
    /// Create a registry holding the full catalogue
    pub fn new() -> Self {
        Self {
            fields: ComputedField::all()
                .iter()
                .map(|field| (field.code(), *field))
                .collect(),
        }
    }

    /// Shared registry holding the full catalogue
    pub fn standard() -> &'static Self {
        &STANDARD
    }

    /// Find the field a code names, with or without the `EL_` prefix
    pub fn lookup(&self, code: &str) -> Option<ComputedField> {
        self.fields.get(code).copied().or_else(|| {
            ComputedField::from_code(code).filter(|field| self.fields.contains_key(field.code()))
        })
    }

    /// Check whether a code is registered
    pub fn exists(&self, code: &str) -> bool {
        self.lookup(code).is_some()
    }

    /// Registered codes in catalogue order, without the prefix
    pub fn available_codes(&self) -> Vec<&'static str> {
        ComputedField::all()
            .iter()
            .map(|field| field.code())
            .filter(|code| self.fields.contains_key(code))
            .collect()
    }

    /// Resolve one code. Never fails: unknown codes and resolver failures
    /// yield null and record a diagnostic on the context.
    pub async fn resolve(&self, code: &str, ctx: &EvaluationContext) -> ScalarValue {
        let Some(field) = self.lookup(code) else {
            ctx.record(
                Diagnostic::warning(
                    DiagnosticCode::UnknownComputedField,
                    format!("Computed field '{code}' is not registered"),
                )
                .with_subject(code),
            );
            return ScalarValue::Null;
        };

        match field.resolve(ctx).await {
            Ok(value) => {
                log::debug!("Resolved {code} = {value}");
                value
            }
            Err(err) => {
                ctx.record(
                    Diagnostic::error(DiagnosticCode::ResolverFailure, err.to_string())
                        .with_subject(code),
                );
                ScalarValue::Null
            }
        }
    }

    /// Resolve several codes concurrently. Duplicates are resolved once; the
    /// result is keyed by each code exactly as requested, in first-seen order.
    pub async fn resolve_many<I, S>(&self, codes: I, ctx: &EvaluationContext) -> IndexMap<String, ScalarValue>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let codes: IndexSet<String> = codes.into_iter().map(Into::into).collect();
        let resolved = join_all(codes.iter().map(|code| self.resolve(code, ctx))).await;
        codes.into_iter().zip(resolved).collect()
    }

    /// Computed-field codes referenced anywhere in `filters`, de-duplicated
    /// in first-seen order and spelled as the rules spell them
    pub fn referenced_codes<'a, I>(&self, filters: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a Filter>,
    {
        let mut codes: IndexSet<String> = IndexSet::new();
        for filter in filters {
            for field in filter.referenced_fields() {
                if self.exists(field) && !codes.contains(field) {
                    codes.insert(field.to_string());
                }
            }
        }
        codes.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{FixedClock, QuestionnaireInfo, SessionInfo};
    use crate::directory::NullDirectory;
    use crate::filter::{Condition, Group, Logic};
    use std::sync::Arc;

    fn context(questionnaire: QuestionnaireInfo) -> EvaluationContext {
        EvaluationContext::new(
            SessionInfo::new(7, 42).with_user_name("Maria"),
            questionnaire,
            Arc::new(NullDirectory),
        )
        .with_clock(Arc::new(FixedClock::ymd(2025, 3, 9).unwrap()))
    }

    #[test]
    fn test_lookup_accepts_prefix() {
        let registry = ContextResolverRegistry::standard();
        assert_eq!(registry.lookup("UF"), Some(ComputedField::State));
        assert_eq!(registry.lookup("EL_UF"), Some(ComputedField::State));
        assert!(!registry.exists("EL_NOPE"));
        assert_eq!(registry.available_codes().len(), ComputedField::ALL.len());
        assert_eq!(registry.available_codes()[0], "ESFERA");
    }

    #[tokio::test]
    async fn test_unknown_code_is_null_with_diagnostic() {
        let ctx = context(QuestionnaireInfo::new(1));
        let value = ContextResolverRegistry::standard().resolve("EL_NOPE", &ctx).await;

        assert_eq!(value, ScalarValue::Null);
        let diagnostics = ctx.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, DiagnosticCode::UnknownComputedField);
        assert_eq!(diagnostics[0].subject.as_deref(), Some("EL_NOPE"));
    }

    #[tokio::test]
    async fn test_clock_and_questionnaire_fields() {
        let registry = ContextResolverRegistry::standard();
        let ctx = context(QuestionnaireInfo::new(1));
        let values = registry
            .resolve_many(
                ["ANO_ATUAL", "EL_MES_ATUAL", "DATA_ATUAL", "ANO_REFERENCIA", "MES_REFERENCIA"],
                &ctx,
            )
            .await;

        assert_eq!(values["ANO_ATUAL"], ScalarValue::Number(2025.0));
        assert_eq!(values["EL_MES_ATUAL"], ScalarValue::Number(3.0));
        assert_eq!(values["DATA_ATUAL"], ScalarValue::string("2025-03-09"));
        assert_eq!(values["ANO_REFERENCIA"], ScalarValue::Number(2025.0));
        assert_eq!(values["MES_REFERENCIA"], ScalarValue::Null);

        let ctx = context(QuestionnaireInfo::new(1).with_reference(2023, Some(12)));
        assert_eq!(
            registry.resolve("ANO_REFERENCIA", &ctx).await,
            ScalarValue::Number(2023.0)
        );
        assert_eq!(
            registry.resolve("MES_REFERENCIA", &ctx).await,
            ScalarValue::Number(12.0)
        );
    }

    #[tokio::test]
    async fn test_current_date_follows_utc_day() {
        let utc = chrono::NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let ctx = context(QuestionnaireInfo::new(1))
            .with_clock(Arc::new(FixedClock::ymd(2025, 3, 9).unwrap().with_utc(utc)));
        let values = ContextResolverRegistry::standard()
            .resolve_many(["DATA_ATUAL", "DIA_ATUAL"], &ctx)
            .await;

        assert_eq!(values["DATA_ATUAL"], ScalarValue::string("2025-03-10"));
        assert_eq!(values["DIA_ATUAL"], ScalarValue::Number(9.0));
    }

    #[tokio::test]
    async fn test_resolve_many_keys_as_requested() {
        let ctx = context(QuestionnaireInfo::new(1));
        let values = ContextResolverRegistry::standard()
            .resolve_many(["SEQ_USUARIO", "EL_SEQ_USUARIO", "SEQ_USUARIO", "PERFIL"], &ctx)
            .await;

        let keys: Vec<_> = values.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["SEQ_USUARIO", "EL_SEQ_USUARIO", "PERFIL"]);
        assert_eq!(values["EL_SEQ_USUARIO"], ScalarValue::Number(7.0));
        assert_eq!(values["PERFIL"], ScalarValue::Null);
    }

    #[tokio::test]
    async fn test_remote_fields_null_when_not_found() {
        let ctx = context(QuestionnaireInfo::new(1));
        let values = ContextResolverRegistry::standard()
            .resolve_many(["UF", "TIPO_ORGAO"], &ctx)
            .await;
        assert!(values.values().all(ScalarValue::is_null));
        assert!(ctx.diagnostics().is_empty());
    }

    #[test]
    fn test_referenced_codes() {
        let filters = [
            Filter::flat(
                Logic::And,
                vec![
                    Condition::field("EL_UF", "EQUAL"),
                    Condition::field("Q_RESPOSTA", "EMPTY"),
                ],
            ),
            Filter::grouped(
                Logic::Or,
                vec![Group::new(
                    Logic::And,
                    vec![
                        Condition::field("ESFERA", "EQUAL"),
                        Condition::field("EL_UF", "EQUAL"),
                        Condition::question(3, "EMPTY"),
                    ],
                )],
            ),
        ];

        let codes = ContextResolverRegistry::standard().referenced_codes(&filters);
        assert_eq!(codes, vec!["EL_UF".to_string(), "ESFERA".to_string()]);
    }
}
