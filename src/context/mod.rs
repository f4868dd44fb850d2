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

//! Evaluation context for one rendering pass
//!
//! A context bundles the session and questionnaire facts, the remote entity
//! cache, the directory handle and a diagnostic sink. Build a fresh one per
//! pass and drop it afterwards; it is shared by reference between the
//! concurrent resolutions of that pass only.

pub mod cache;
pub mod clock;

pub use cache::{CachedEntity, EntityCache, EntityKind};
pub use clock::{Clock, FixedClock, SystemClock};

use crate::diagnostics::Diagnostic;
use crate::directory::{DirectoryClient, Organization, Tribunal};
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Facts about the logged-in user
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// User id
    #[serde(alias = "seqUsuario")]
    pub user_id: i64,
    /// Organization the user answers for
    #[serde(alias = "seqOrgao")]
    pub organization_id: i64,
    /// Access profile
    #[serde(default, alias = "seqPerfil")]
    pub profile_id: Option<i64>,
    /// Display name
    #[serde(default, alias = "nomUsuario")]
    pub user_name: String,
}

impl SessionInfo {
    /// Session for a user answering on behalf of an organization
    pub fn new(user_id: i64, organization_id: i64) -> Self {
        Self {
            user_id,
            organization_id,
            ..Self::default()
        }
    }

    /// Set the profile id
    pub fn with_profile(mut self, profile_id: i64) -> Self {
        self.profile_id = Some(profile_id);
        self
    }

    /// Set the user name
    pub fn with_user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = user_name.into();
        self
    }
}

/// Facts about the questionnaire being answered
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionnaireInfo {
    /// Questionnaire id
    #[serde(alias = "seqQuestionario")]
    pub questionnaire_id: i64,
    /// Reference year; overrides the wall clock
    #[serde(default, alias = "anoReferencia")]
    pub reference_year: Option<i32>,
    /// Reference month 1-12
    #[serde(default, alias = "mesReferencia")]
    pub reference_month: Option<u32>,
}

impl QuestionnaireInfo {
    /// Questionnaire without an explicit reference period
    pub fn new(questionnaire_id: i64) -> Self {
        Self {
            questionnaire_id,
            ..Self::default()
        }
    }

    /// Set the reference period
    pub fn with_reference(mut self, year: i32, month: Option<u32>) -> Self {
        self.reference_year = Some(year);
        self.reference_month = month;
        self
    }
}

/// Per-pass evaluation context
pub struct EvaluationContext {
    /// Session facts
    pub session: SessionInfo,
    /// Questionnaire facts
    pub questionnaire: QuestionnaireInfo,
    cache: EntityCache,
    directory: Arc<dyn DirectoryClient>,
    clock: Arc<dyn Clock>,
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl EvaluationContext {
    /// Create a context reading the local system clock
    pub fn new(
        session: SessionInfo,
        questionnaire: QuestionnaireInfo,
        directory: Arc<dyn DirectoryClient>,
    ) -> Self {
        Self {
            session,
            questionnaire,
            cache: EntityCache::new(),
            directory,
            clock: Arc::new(SystemClock),
            diagnostics: Mutex::new(Vec::new()),
        }
    }

    /// Replace the clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Current date, read now
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Today's UTC date from the context's clock
    pub fn utc_today(&self) -> NaiveDate {
        self.clock.utc_today()
    }

    /// Remote entity cache
    pub fn cache(&self) -> &EntityCache {
        &self.cache
    }

    /// Tribunal of the session's organization, fetched at most once
    pub async fn tribunal(&self) -> CachedEntity<Tribunal> {
        let directory = Arc::clone(&self.directory);
        let organization_id = self.session.organization_id;
        self.cache
            .tribunal(move || async move {
                directory.get_tribunal_of_organization(organization_id).await
            })
            .await
    }

    /// The session's organization, fetched at most once
    pub async fn organization(&self) -> CachedEntity<Organization> {
        let directory = Arc::clone(&self.directory);
        let organization_id = self.session.organization_id;
        self.cache
            .organization(move || async move { directory.get_organization(organization_id).await })
            .await
    }

    /// Record a diagnostic and emit it through the log facade
    pub fn record(&self, diagnostic: Diagnostic) {
        diagnostic.log();
        self.diagnostics.lock().push(diagnostic);
    }

    /// Snapshot of the diagnostics recorded so far
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.lock().clone()
    }

    /// Drain the recorded diagnostics
    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.diagnostics.lock())
    }
}

impl std::fmt::Debug for EvaluationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluationContext")
            .field("session", &self.session)
            .field("questionnaire", &self.questionnaire)
            .field("cache", &self.cache)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}
