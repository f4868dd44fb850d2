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

//! Shared helpers for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use form_visibility::context::{EvaluationContext, FixedClock, QuestionnaireInfo, SessionInfo};
use form_visibility::directory::{
    DirectoryClient, DirectoryError, DirectoryResult, Organization, Tribunal,
};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// In-memory directory counting every call it receives
#[derive(Debug, Default)]
pub struct CountingDirectory {
    tribunal: Option<Tribunal>,
    organization: Option<Organization>,
    fail: bool,
    latency: Duration,
    tribunal_calls: AtomicUsize,
    organization_calls: AtomicUsize,
}

impl CountingDirectory {
    /// Directory knowing a state tribunal in SP and a "VARA" organization
    pub fn state_court() -> Self {
        Self {
            tribunal: Some(
                serde_json::from_value(json!({
                    "seqOrgao": 100,
                    "nome": "Tribunal de Justiça de São Paulo",
                    "sigla": "TJSP",
                    "esfera": "E",
                    "ufs": ["SP"],
                    "porte": "GRANDE"
                }))
                .unwrap(),
            ),
            organization: Some(
                serde_json::from_value(json!({
                    "seqOrgao": 42,
                    "dscOrgao": "1ª Vara Cível",
                    "seqOrgaoPai": 100,
                    "tipoOrgao": {"codigo": "VARA", "descricao": "Vara"}
                }))
                .unwrap(),
            ),
            ..Self::default()
        }
    }

    /// Directory whose every lookup fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Delay every answer
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn tribunal_calls(&self) -> usize {
        self.tribunal_calls.load(Ordering::SeqCst)
    }

    pub fn organization_calls(&self) -> usize {
        self.organization_calls.load(Ordering::SeqCst)
    }

    async fn answer<T: Clone>(&self, entity: &Option<T>) -> DirectoryResult<Option<T>> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.fail {
            return Err(DirectoryError::Unavailable("connection refused".to_string()));
        }
        Ok(entity.clone())
    }
}

#[async_trait]
impl DirectoryClient for CountingDirectory {
    async fn get_organization(&self, _: i64) -> DirectoryResult<Option<Organization>> {
        self.organization_calls.fetch_add(1, Ordering::SeqCst);
        self.answer(&self.organization).await
    }

    async fn get_tribunal_of_organization(&self, _: i64) -> DirectoryResult<Option<Tribunal>> {
        self.tribunal_calls.fetch_add(1, Ordering::SeqCst);
        self.answer(&self.tribunal).await
    }
}

/// Context for user 7 of organization 42, frozen on 2025-03-09
pub fn context(directory: Arc<CountingDirectory>) -> EvaluationContext {
    EvaluationContext::new(
        SessionInfo::new(7, 42).with_user_name("Maria"),
        QuestionnaireInfo::new(1),
        directory,
    )
    .with_clock(Arc::new(FixedClock::ymd(2025, 3, 9).unwrap()))
}
