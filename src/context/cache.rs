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

//! Per-context single-flight cache of remote entities
//!
//! Each entity kind has one slot. The first requester spawns the fetch; every
//! concurrent requester awaits the same slot, so a context never issues more
//! than one remote call per kind. On a tokio runtime the fetch runs in its own
//! task: dropping the requesting future does not abort it, and the slot is
//! still filled. Elsewhere it runs inline in the requesting future.
//!
//! Failures are cached too, so a failing directory is called once per pass.

use crate::directory::{DirectoryResult, Organization, Tribunal};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Remote entity kinds a context caches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Tribunal of the session's organization
    TribunalOfOrganization,
    /// The session's organization
    Organization,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TribunalOfOrganization => f.write_str("tribunal of organization"),
            Self::Organization => f.write_str("organization"),
        }
    }
}

/// Settled outcome of a remote lookup
#[derive(Debug, Clone, PartialEq)]
pub enum CachedEntity<T> {
    /// Entity found
    Found(Arc<T>),
    /// Directory answered that the entity does not exist
    NotFound,
    /// Lookup failed; the message is kept for diagnostics
    Failed(String),
}

impl<T> CachedEntity<T> {
    /// Entity, if found
    pub fn found(&self) -> Option<&T> {
        match self {
            Self::Found(entity) => Some(entity.as_ref()),
            _ => None,
        }
    }

    fn from_lookup(kind: EntityKind, result: DirectoryResult<Option<T>>) -> Self {
        match result {
            Ok(Some(entity)) => Self::Found(Arc::new(entity)),
            Ok(None) => {
                log::debug!("Directory has no {kind}");
                Self::NotFound
            }
            Err(err) => {
                log::error!("Failed to fetch {kind}: {err}");
                Self::Failed(err.to_string())
            }
        }
    }
}

type Slot<T> = Arc<OnceCell<CachedEntity<T>>>;

/// Single-flight slots for every [`EntityKind`]
#[derive(Debug, Default)]
pub struct EntityCache {
    tribunal: Slot<Tribunal>,
    organization: Slot<Organization>,
}

impl EntityCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a kind has settled (found, not found or failed)
    pub fn is_settled(&self, kind: EntityKind) -> bool {
        match kind {
            EntityKind::TribunalOfOrganization => self.tribunal.initialized(),
            EntityKind::Organization => self.organization.initialized(),
        }
    }

    /// Cached tribunal, fetching it with `fetch` on first use
    pub async fn tribunal<F, Fut>(&self, fetch: F) -> CachedEntity<Tribunal>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = DirectoryResult<Option<Tribunal>>> + Send + 'static,
    {
        single_flight(&self.tribunal, EntityKind::TribunalOfOrganization, fetch).await
    }

    /// Cached organization, fetching it with `fetch` on first use
    pub async fn organization<F, Fut>(&self, fetch: F) -> CachedEntity<Organization>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = DirectoryResult<Option<Organization>>> + Send + 'static,
    {
        single_flight(&self.organization, EntityKind::Organization, fetch).await
    }
}

async fn single_flight<T, F, Fut>(slot: &Slot<T>, kind: EntityKind, fetch: F) -> CachedEntity<T>
where
    T: Clone + Send + Sync + 'static,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = DirectoryResult<Option<T>>> + Send + 'static,
{
    if let Some(settled) = slot.get() {
        return settled.clone();
    }

    let slot = Arc::clone(slot);
    let settle = async move {
        slot.get_or_init(|| async move {
            log::debug!("Fetching {kind}");
            CachedEntity::from_lookup(kind, fetch().await)
        })
        .await
        .clone()
    };

    // without a tokio runtime the fetch runs inline on the caller's executor
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        return settle.await;
    };

    match runtime.spawn(settle).await {
        Ok(settled) => settled,
        Err(err) => CachedEntity::Failed(format!("{kind} lookup aborted: {err}")),
    }
}
