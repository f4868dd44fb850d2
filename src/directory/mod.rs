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

//! Organizational directory collaborator
//!
//! The directory answers two questions for the resolvers: what an
//! organization is, and which tribunal it belongs to. The engine only depends
//! on the [`DirectoryClient`] trait; [`HttpDirectoryClient`] talks to the
//! directory proxy over HTTP/JSON.

pub mod config;
pub mod http;

pub use config::{CacheConfig, ConfigError, DirectoryConfig};
pub use http::HttpDirectoryClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for directory lookups
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Errors raised by a directory client
#[derive(Error, Debug)]
pub enum DirectoryError {
    /// Transport failure, including timeouts
    #[error("Directory request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status other than 404
    #[error("Directory returned HTTP {status} for {path}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Requested path
        path: String,
    },

    /// The proxy answered with `success: false`
    #[error("Directory error: {0}")]
    Api(String),

    /// Payload did not match the expected shape
    #[error("Invalid directory payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// Request URL could not be built
    #[error("Invalid directory URL: {0}")]
    Url(#[from] url::ParseError),

    /// Client configuration was rejected
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Lookup unavailable for another reason
    #[error("Directory unavailable: {0}")]
    Unavailable(String),
}

/// Organization type as sent by newer proxy versions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationType {
    /// Type code
    #[serde(rename = "codigo")]
    pub code: String,
    /// Type description
    #[serde(default, rename = "descricao", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// An organization (court unit) known to the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    /// Organization id
    #[serde(rename = "seqOrgao")]
    pub id: i64,

    /// Display name
    #[serde(rename = "dscOrgao", alias = "nome", default)]
    pub name: String,

    /// Parent organization id
    #[serde(rename = "seqOrgaoPai", default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,

    /// Plain type code
    #[serde(rename = "tipo", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Structured type
    #[serde(rename = "tipoOrgao", default, skip_serializing_if = "Option::is_none")]
    pub kind_detail: Option<OrganizationType>,
}

impl Organization {
    /// Type code from whichever representation the proxy sent
    pub fn organization_type(&self) -> Option<&str> {
        self.kind
            .as_deref()
            .or_else(|| self.kind_detail.as_ref().map(|detail| detail.code.as_str()))
    }
}

/// The tribunal an organization belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tribunal {
    /// Organization id of the tribunal itself
    #[serde(rename = "seqOrgao")]
    pub id: i64,

    /// Full name
    #[serde(rename = "nome", default)]
    pub name: String,

    /// Acronym, e.g. `TJSP`
    #[serde(rename = "sigla", default)]
    pub acronym: String,

    /// Jurisdiction sphere, either spelled out or as a one-letter code
    #[serde(rename = "esfera", default, skip_serializing_if = "Option::is_none")]
    pub sphere: Option<String>,

    /// Single state
    #[serde(rename = "uf", default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// States covered, for tribunals spanning several
    #[serde(rename = "ufs", default, skip_serializing_if = "Vec::is_empty")]
    pub states: Vec<String>,

    /// Size class (`PEQUENO`, `MEDIO`, `GRANDE`)
    #[serde(rename = "porte", default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

impl Tribunal {
    /// Jurisdiction sphere spelled out (`E` becomes `ESTADUAL`)
    pub fn sphere_name(&self) -> Option<&str> {
        self.sphere.as_deref().map(|sphere| match sphere {
            "S" | "s" => "SUPERIOR",
            "E" | "e" => "ESTADUAL",
            "F" | "f" => "FEDERAL",
            "T" | "t" => "TRABALHO",
            "L" | "l" => "ELEITORAL",
            "M" | "m" => "MILITAR",
            other => other,
        })
    }

    /// Primary state: `uf`, else the first of `ufs`
    pub fn primary_state(&self) -> Option<&str> {
        self.state
            .as_deref()
            .or_else(|| self.states.first().map(String::as_str))
    }
}

/// Remote organizational directory.
///
/// `Ok(None)` means the directory answered and the entity does not exist.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Look up an organization by id
    async fn get_organization(&self, organization_id: i64)
    -> DirectoryResult<Option<Organization>>;

    /// Look up the tribunal an organization belongs to
    async fn get_tribunal_of_organization(
        &self,
        organization_id: i64,
    ) -> DirectoryResult<Option<Tribunal>>;
}

/// Directory that knows nothing; every lookup is `Ok(None)`
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDirectory;

#[async_trait]
impl DirectoryClient for NullDirectory {
    async fn get_organization(&self, _: i64) -> DirectoryResult<Option<Organization>> {
        Ok(None)
    }

    async fn get_tribunal_of_organization(&self, _: i64) -> DirectoryResult<Option<Tribunal>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tribunal_wire_shapes() {
        let single: Tribunal = serde_json::from_value(json!({
            "seqOrgao": 10, "nome": "Tribunal de Justiça", "sigla": "TJSP",
            "esfera": "ESTADUAL", "uf": "SP", "porte": "GRANDE"
        }))
        .unwrap();
        assert_eq!(single.primary_state(), Some("SP"));
        assert_eq!(single.sphere_name(), Some("ESTADUAL"));

        let multi: Tribunal = serde_json::from_value(json!({
            "seqOrgao": 11, "nome": "TRF 3", "sigla": "TRF3", "esfera": "F", "ufs": ["SP", "MS"]
        }))
        .unwrap();
        assert_eq!(multi.primary_state(), Some("SP"));
        assert_eq!(multi.sphere_name(), Some("FEDERAL"));
        assert_eq!(multi.size, None);
    }

    #[test]
    fn test_organization_type_shapes() {
        let plain: Organization = serde_json::from_value(json!({
            "seqOrgao": 1, "dscOrgao": "Vara", "tipo": "VARA"
        }))
        .unwrap();
        assert_eq!(plain.organization_type(), Some("VARA"));

        let nested: Organization = serde_json::from_value(json!({
            "seqOrgao": 2, "dscOrgao": "Comarca", "seqOrgaoPai": 1,
            "tipoOrgao": {"codigo": "COMARCA", "descricao": "Comarca"}
        }))
        .unwrap();
        assert_eq!(nested.organization_type(), Some("COMARCA"));
        assert_eq!(nested.parent_id, Some(1));
    }

    #[tokio::test]
    async fn test_null_directory() {
        let directory = NullDirectory;
        assert!(directory.get_organization(1).await.unwrap().is_none());
        assert!(directory.get_tribunal_of_organization(1).await.unwrap().is_none());
    }
}
