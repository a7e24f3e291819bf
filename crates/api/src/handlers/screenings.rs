//! `POST /v1/screenings` -- the one substantive route the intake shim
//! exposes. Accepts a subject plus the screening parameters, runs it
//! through the orchestrator end to end, and hands back whatever phase it
//! stopped at.

use std::collections::HashMap;

use axum::{extract::State, Json};
use chrono::NaiveDate;
use screening::entity::resolver::SubjectIdentifiers;
use screening::entity::types::IdentifierKind;
use screening::orchestrator::{ScreeningRequest, ScreeningResult};
use screening::types::{CheckType, RoleCategory, SearchDegree, ServiceTier};
use screening_core::error::{Error, Result};
use screening_core::TenantId;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubjectIntake {
    pub full_name: String,
    pub dob: Option<NaiveDate>,
    pub address: Option<String>,
    #[serde(default)]
    pub identifiers: HashMap<IdentifierKind, String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl From<SubjectIntake> for SubjectIdentifiers {
    fn from(intake: SubjectIntake) -> Self {
        SubjectIdentifiers {
            full_name: intake.full_name,
            dob: intake.dob,
            address: intake.address,
            exact: intake.identifiers,
            aliases: intake.aliases,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ScreeningIntakeRequest {
    pub tenant_id: Uuid,
    #[serde(default)]
    pub correlation_id: Option<Uuid>,
    pub subject: SubjectIntake,
    pub role: RoleCategory,
    #[serde(default = "default_locale")]
    pub locale: String,
    pub tier: ServiceTier,
    pub search_degree: SearchDegree,
    /// Omitted entirely means "screen every information type".
    pub requested_checks: Option<Vec<CheckType>>,
    pub consent_token: Option<String>,
}

fn default_locale() -> String {
    "DEFAULT".to_string()
}

impl From<ScreeningIntakeRequest> for ScreeningRequest {
    fn from(intake: ScreeningIntakeRequest) -> Self {
        ScreeningRequest {
            tenant_id: TenantId(intake.tenant_id),
            correlation_id: intake.correlation_id.unwrap_or_else(Uuid::now_v7),
            subject: intake.subject.into(),
            role: intake.role,
            locale: intake.locale,
            tier: intake.tier,
            search_degree: intake.search_degree,
            requested_checks: intake.requested_checks.unwrap_or_else(ScreeningRequest::all_check_types),
            consent_token: intake.consent_token,
            cancellation: None,
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/screenings",
    request_body = Object,
    responses(
        (status = 200, description = "Screening ran to completion, was blocked, or failed -- see `status`", body = Object),
        (status = 400, description = "Malformed intake request", body = Object)
    ),
    tag = "screenings"
)]
pub async fn create_screening(
    State(state): State<AppState>,
    Json(intake): Json<ScreeningIntakeRequest>,
) -> std::result::Result<Json<ScreeningResult>, ApiError> {
    validate_intake(&intake)?;
    let request: ScreeningRequest = intake.into();
    let result = state.orchestrator.run(request).await;
    Ok(Json(result))
}

fn validate_intake(intake: &ScreeningIntakeRequest) -> Result<()> {
    if intake.subject.full_name.trim().is_empty() {
        return Err(Error::validation("subject.full_name must not be empty"));
    }
    if let Some(checks) = &intake.requested_checks {
        if checks.is_empty() {
            return Err(Error::validation("requested_checks must not be an empty list; omit the field instead"));
        }
    }
    Ok(())
}
