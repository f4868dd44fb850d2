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

//! Computed-field catalogue

use crate::context::{CachedEntity, EntityKind, EvaluationContext};
use crate::model::{COMPUTED_FIELD_PREFIX, ScalarValue};
use chrono::Datelike;
use std::fmt;
use thiserror::Error;

/// Resolver failure; converted to a null value plus a diagnostic by the registry
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    /// The remote entity this field derives from could not be fetched
    #[error("Lookup of {kind} failed: {message}")]
    Lookup {
        /// Entity kind that failed
        kind: EntityKind,
        /// Failure message
        message: String,
    },
}

/// Where a computed field takes its value from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldSource {
    /// Tribunal of the session's organization (remote)
    Tribunal,
    /// The session's organization (remote)
    Organization,
    /// Session facts
    Session,
    /// Wall clock at resolution time
    Clock,
    /// Questionnaire reference period, falling back to the wall clock
    Questionnaire,
}

impl FieldSource {
    /// Remote entity kind this source needs, if any
    pub fn entity_kind(self) -> Option<EntityKind> {
        match self {
            Self::Tribunal => Some(EntityKind::TribunalOfOrganization),
            Self::Organization => Some(EntityKind::Organization),
            _ => None,
        }
    }
}

/// A derivable fact rule authors can reference by code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComputedField {
    /// `ESFERA`
    Sphere,
    /// `UF`
    State,
    /// `SIGLA_TRIBUNAL`
    TribunalAcronym,
    /// `NOME_TRIBUNAL`
    TribunalName,
    /// `PORTE`
    TribunalSize,
    /// `SEQ_ORGAO`
    OrganizationId,
    /// `TIPO_ORGAO`
    OrganizationType,
    /// `SEQ_USUARIO`
    UserId,
    /// `NOME_USUARIO`
    UserName,
    /// `PERFIL`
    Profile,
    /// `ANO_ATUAL`
    CurrentYear,
    /// `MES_ATUAL`
    CurrentMonth,
    /// `DIA_ATUAL`
    CurrentDay,
    /// `DATA_ATUAL`
    CurrentDate,
    /// `ANO_REFERENCIA`
    ReferenceYear,
    /// `MES_REFERENCIA`
    ReferenceMonth,
}

impl ComputedField {
    /// Every registered field, in catalogue order
    pub const ALL: [ComputedField; 16] = [
        Self::Sphere,
        Self::State,
        Self::TribunalAcronym,
        Self::TribunalName,
        Self::TribunalSize,
        Self::OrganizationId,
        Self::OrganizationType,
        Self::UserId,
        Self::UserName,
        Self::Profile,
        Self::CurrentYear,
        Self::CurrentMonth,
        Self::CurrentDay,
        Self::CurrentDate,
        Self::ReferenceYear,
        Self::ReferenceMonth,
    ];

    /// Every registered field, in catalogue order
    pub fn all() -> &'static [ComputedField] {
        &Self::ALL
    }

    /// Canonical code, without the `EL_` prefix
    pub fn code(self) -> &'static str {
        match self {
            Self::Sphere => "ESFERA",
            Self::State => "UF",
            Self::TribunalAcronym => "SIGLA_TRIBUNAL",
            Self::TribunalName => "NOME_TRIBUNAL",
            Self::TribunalSize => "PORTE",
            Self::OrganizationId => "SEQ_ORGAO",
            Self::OrganizationType => "TIPO_ORGAO",
            Self::UserId => "SEQ_USUARIO",
            Self::UserName => "NOME_USUARIO",
            Self::Profile => "PERFIL",
            Self::CurrentYear => "ANO_ATUAL",
            Self::CurrentMonth => "MES_ATUAL",
            Self::CurrentDay => "DIA_ATUAL",
            Self::CurrentDate => "DATA_ATUAL",
            Self::ReferenceYear => "ANO_REFERENCIA",
            Self::ReferenceMonth => "MES_REFERENCIA",
        }
    }

    /// Code with the `EL_` prefix, as rule authors usually write it
    pub fn prefixed_code(self) -> String {
        format!("{COMPUTED_FIELD_PREFIX}{}", self.code())
    }

    /// Parse a code, with or without the `EL_` prefix. Codes are case-sensitive.
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.strip_prefix(COMPUTED_FIELD_PREFIX).unwrap_or(code);
        Self::ALL.into_iter().find(|field| field.code() == code)
    }

    /// Where the value comes from
    pub fn source(self) -> FieldSource {
        match self {
            Self::Sphere
            | Self::State
            | Self::TribunalAcronym
            | Self::TribunalName
            | Self::TribunalSize => FieldSource::Tribunal,
            Self::OrganizationType => FieldSource::Organization,
            Self::OrganizationId | Self::UserId | Self::UserName | Self::Profile => {
                FieldSource::Session
            }
            Self::CurrentYear | Self::CurrentMonth | Self::CurrentDay | Self::CurrentDate => {
                FieldSource::Clock
            }
            Self::ReferenceYear | Self::ReferenceMonth => FieldSource::Questionnaire,
        }
    }

    /// Short description for listings
    pub fn description(self) -> &'static str {
        match self {
            Self::Sphere => "Jurisdiction sphere of the tribunal",
            Self::State => "State (UF) of the tribunal",
            Self::TribunalAcronym => "Tribunal acronym",
            Self::TribunalName => "Tribunal name",
            Self::TribunalSize => "Tribunal size class",
            Self::OrganizationId => "Organization id of the session",
            Self::OrganizationType => "Organization type",
            Self::UserId => "User id of the session",
            Self::UserName => "User name of the session",
            Self::Profile => "Profile id of the session",
            Self::CurrentYear => "Current year",
            Self::CurrentMonth => "Current month (1-12)",
            Self::CurrentDay => "Current day of month",
            Self::CurrentDate => "Current UTC date (YYYY-MM-DD)",
            Self::ReferenceYear => "Questionnaire reference year, else the current year",
            Self::ReferenceMonth => "Questionnaire reference month",
        }
    }

    /// Compute the value for `ctx`. Remote-backed fields go through the
    /// context's single-flight cache; a missing entity yields null.
    pub async fn resolve(self, ctx: &EvaluationContext) -> Result<ScalarValue, ResolveError> {
        let value = match self {
            Self::Sphere | Self::State | Self::TribunalAcronym | Self::TribunalName | Self::TribunalSize => {
                let tribunal = settled(ctx.tribunal().await, EntityKind::TribunalOfOrganization)?;
                let Some(tribunal) = tribunal else {
                    return Ok(ScalarValue::Null);
                };
                match self {
                    Self::Sphere => tribunal.sphere_name().into(),
                    Self::State => tribunal.primary_state().into(),
                    Self::TribunalAcronym => tribunal.acronym.as_str().into(),
                    Self::TribunalName => tribunal.name.as_str().into(),
                    _ => tribunal.size.as_deref().into(),
                }
            }
            Self::OrganizationType => settled(ctx.organization().await, EntityKind::Organization)?
                .and_then(|organization| organization.organization_type().map(ScalarValue::string))
                .unwrap_or_default(),
            Self::OrganizationId => ctx.session.organization_id.into(),
            Self::UserId => ctx.session.user_id.into(),
            Self::UserName => ctx.session.user_name.as_str().into(),
            Self::Profile => ctx.session.profile_id.into(),
            Self::CurrentYear => ctx.today().year().into(),
            Self::CurrentMonth => ctx.today().month().into(),
            Self::CurrentDay => ctx.today().day().into(),
            // ISO date of the UTC day, unlike the local year/month/day fields
            Self::CurrentDate => ctx.utc_today().format("%Y-%m-%d").to_string().into(),
            Self::ReferenceYear => ctx
                .questionnaire
                .reference_year
                .unwrap_or_else(|| ctx.today().year())
                .into(),
            Self::ReferenceMonth => ctx.questionnaire.reference_month.into(),
        };
        Ok(value)
    }
}

fn settled<T>(entity: CachedEntity<T>, kind: EntityKind) -> Result<Option<std::sync::Arc<T>>, ResolveError> {
    match entity {
        CachedEntity::Found(entity) => Ok(Some(entity)),
        CachedEntity::NotFound => Ok(None),
        CachedEntity::Failed(message) => Err(ResolveError::Lookup { kind, message }),
    }
}

impl fmt::Display for ComputedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
