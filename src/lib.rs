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

//! Contextual visibility rules for periodic questionnaires
//!
//! Two halves: a registry of computed-field resolvers that derive facts about
//! the responding user and organization (cached once per evaluation pass), and
//! a pure evaluator that decides question visibility from AND/OR condition
//! trees over answers and those computed fields.
//!
//! ```rust,no_run
//! use form_visibility::{
//!     EvaluationContext, HttpDirectoryClient, QuestionnaireInfo, ResolvedValueMap,
//!     SessionInfo, VisibilityEngine, QuestionRule, Filter,
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let directory = Arc::new(HttpDirectoryClient::from_env()?);
//! let ctx = EvaluationContext::new(SessionInfo::new(7, 42), QuestionnaireInfo::new(1), directory);
//!
//! let filter = Filter::from_json_str(
//!     r#"{"logic":"AND","conditions":[{"field":"EL_ESFERA","operator":"EQUAL","value":"ESTADUAL"}]}"#,
//! )?;
//! let questions = vec![QuestionRule { id: 1, code: None, filter }];
//!
//! let outcome = VisibilityEngine::new()
//!     .evaluate_questions(&questions, &ResolvedValueMap::new(), &ctx)
//!     .await;
//! println!("visible: {:?}", outcome.visible_question_ids());
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod diagnostics;
pub mod directory;
pub mod engine;
pub mod evaluator;
pub mod filter;
pub mod model;
pub mod registry;
pub mod validation;

// Re-export main types
pub use context::{EvaluationContext, QuestionnaireInfo, SessionInfo};
pub use diagnostics::{Diagnostic, DiagnosticCode, Severity};
pub use directory::{DirectoryClient, DirectoryConfig, DirectoryError, HttpDirectoryClient};
pub use engine::{QuestionRule, VisibilityEngine, VisibilityOutcome};
pub use evaluator::{EvaluationTrace, evaluate_filter, explain, is_visible};
pub use filter::{Condition, Filter, FilterError, Group, Logic, MalformedMember, Operator};
pub use model::{ResolvedValueMap, ScalarValue};
pub use registry::{ComputedField, ContextResolverRegistry};
pub use validation::{ValidationReport, validate_filter};
