// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the admin/management API.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use roost_core::FleetError;
use roost_core::types::{
    ApprovalState, BotAction, BotRecord, BotStatus, CrossTenancyAction, FeatureFlags,
    RegistryEntry,
};
use roost_registry::RelayRequest;

use crate::server::GatewayState;

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Owning server name, present on registry conflicts for redirection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

/// Wrapper turning [`FleetError`] into an HTTP response.
pub struct ApiError(pub FleetError);

impl From<FleetError> for ApiError {
    fn from(e: FleetError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, owner) = match &self.0 {
            FleetError::NotFound { .. } => (StatusCode::NOT_FOUND, None),
            FleetError::Unapproved { .. } => (StatusCode::FORBIDDEN, None),
            FleetError::RegistryConflict { owner, .. } => {
                (StatusCode::CONFLICT, Some(owner.clone()))
            }
            FleetError::Config(_) => (StatusCode::BAD_REQUEST, None),
            FleetError::CredentialInvalid(_) => (StatusCode::UNPROCESSABLE_ENTITY, None),
            FleetError::LockContention { .. } => (StatusCode::TOO_MANY_REQUESTS, None),
            FleetError::Relay { .. } => (StatusCode::BAD_GATEWAY, None),
            FleetError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, None),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, None),
        };
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                owner,
            }),
        )
            .into_response()
    }
}

/// Response body for GET /health.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub server: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// GET /health (public).
pub async fn get_public_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        server: state.server_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

#[derive(Debug, Deserialize)]
pub struct ListBotsQuery {
    #[serde(default)]
    pub approval: Option<String>,
}

/// GET /v1/bots?approval=pending|approved|rejected
pub async fn list_bots(
    State(state): State<GatewayState>,
    Query(query): Query<ListBotsQuery>,
) -> Result<Json<Vec<BotRecord>>, ApiError> {
    let approval = match query.approval.as_deref() {
        None => None,
        Some(raw) => Some(raw.parse::<ApprovalState>().map_err(|_| {
            FleetError::Config(format!("unknown approval filter `{raw}`"))
        })?),
    };
    Ok(Json(state.store.list_bots(approval).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateBotRequest {
    /// Explicit bot id; a UUID is generated when omitted.
    #[serde(default)]
    pub id: Option<String>,
}

/// POST /v1/bots -- register a new bot record, pending approval.
pub async fn create_bot(
    State(state): State<GatewayState>,
    Json(body): Json<CreateBotRequest>,
) -> Result<(StatusCode, Json<BotRecord>), ApiError> {
    let now = chrono::Utc::now().to_rfc3339();
    let bot = BotRecord {
        id: body.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        server_name: state.server_name.clone(),
        external_identity: None,
        status: BotStatus::Offline,
        features: FeatureFlags::default(),
        messages_handled: 0,
        commands_handled: 0,
        approval: ApprovalState::Pending,
        approval_expires_at: None,
        last_seen_at: None,
        created_at: now.clone(),
        updated_at: now,
    };
    state.store.create_bot(&bot).await?;
    info!(bot_id = %bot.id, "bot registered, pending approval");
    Ok((StatusCode::CREATED, Json(bot)))
}

/// GET /v1/bots/{id}
pub async fn get_bot(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<BotRecord>, ApiError> {
    let bot = state
        .store
        .get_bot(&id)
        .await?
        .ok_or_else(|| FleetError::not_found("bot", &id))?;
    Ok(Json(bot))
}

/// DELETE /v1/bots/{id} -- stop the session and remove the record.
pub async fn delete_bot(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.fleet.stop_bot(&id).await?;
    state.store.delete_bot(&id).await?;
    info!(bot_id = %id, "bot deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct RegisterIdentityRequest {
    pub identity: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterIdentityResponse {
    pub identity: String,
    pub owner: String,
}

/// POST /v1/bots/{id}/register -- claim an external identity for this bot.
///
/// A lost race returns 409 with the winning owner's name in the body.
pub async fn register_identity(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<RegisterIdentityRequest>,
) -> Result<Json<RegisterIdentityResponse>, ApiError> {
    state
        .store
        .get_bot(&id)
        .await?
        .ok_or_else(|| FleetError::not_found("bot", &id))?;
    state.identity.register(&id, &body.identity).await?;
    Ok(Json(RegisterIdentityResponse {
        identity: body.identity,
        owner: state.server_name.clone(),
    }))
}

/// Body returned by lifecycle endpoints and by `/v1/relay`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ActionResponse {
    pub bot_id: String,
    pub action: BotAction,
    pub status: BotStatus,
}

async fn run_action(
    state: &GatewayState,
    bot_id: &str,
    action: BotAction,
) -> Result<Json<ActionResponse>, ApiError> {
    state.fleet.apply_action(bot_id, action).await?;
    let status = state
        .store
        .get_bot(bot_id)
        .await?
        .map(|b| b.status)
        .unwrap_or(BotStatus::Offline);
    Ok(Json(ActionResponse {
        bot_id: bot_id.to_string(),
        action,
        status,
    }))
}

/// POST /v1/bots/{id}/start
pub async fn start_bot(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<ActionResponse>, ApiError> {
    run_action(&state, &id, BotAction::Start).await
}

/// POST /v1/bots/{id}/stop
pub async fn stop_bot(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<ActionResponse>, ApiError> {
    run_action(&state, &id, BotAction::Stop).await
}

/// POST /v1/bots/{id}/restart
pub async fn restart_bot(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<ActionResponse>, ApiError> {
    run_action(&state, &id, BotAction::Restart).await
}

#[derive(Debug, Default, Deserialize)]
pub struct ApproveRequest {
    /// Approval lifetime in days; indefinite when omitted.
    #[serde(default)]
    pub days: Option<i64>,
}

/// POST /v1/bots/{id}/approve
pub async fn approve_bot(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<ApproveRequest>,
) -> Result<Json<BotRecord>, ApiError> {
    state
        .store
        .get_bot(&id)
        .await?
        .ok_or_else(|| FleetError::not_found("bot", &id))?;
    let expires_at = body
        .days
        .map(|days| (chrono::Utc::now() + chrono::TimeDelta::days(days)).to_rfc3339());
    state
        .store
        .set_bot_approval(&id, ApprovalState::Approved, expires_at.as_deref())
        .await?;
    state
        .store
        .append_activity(&id, "approval", "approved")
        .await?;
    let bot = state
        .store
        .get_bot(&id)
        .await?
        .ok_or_else(|| FleetError::not_found("bot", &id))?;
    Ok(Json(bot))
}

/// POST /v1/bots/{id}/reject
pub async fn reject_bot(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<BotRecord>, ApiError> {
    state
        .store
        .get_bot(&id)
        .await?
        .ok_or_else(|| FleetError::not_found("bot", &id))?;
    state
        .store
        .set_bot_approval(&id, ApprovalState::Rejected, None)
        .await?;
    state
        .store
        .append_activity(&id, "approval", "rejected")
        .await?;
    // A rejected bot is also taken offline.
    state.fleet.stop_bot(&id).await?;
    let bot = state
        .store
        .get_bot(&id)
        .await?
        .ok_or_else(|| FleetError::not_found("bot", &id))?;
    Ok(Json(bot))
}

/// POST /v1/bots/{id}/features/{feature} -- toggle one feature flag.
pub async fn toggle_feature(
    State(state): State<GatewayState>,
    Path((id, feature)): Path<(String, String)>,
) -> Result<Json<FeatureFlags>, ApiError> {
    let bot = state
        .store
        .get_bot(&id)
        .await?
        .ok_or_else(|| FleetError::not_found("bot", &id))?;
    let mut flags = bot.features;
    if !flags.toggle(&feature) {
        return Err(FleetError::Config(format!("unknown feature `{feature}`")).into());
    }
    state.store.set_bot_features(&id, &flags).await?;
    state
        .store
        .append_activity(&id, "feature", &format!("toggled {feature}"))
        .await?;
    Ok(Json(flags))
}

/// GET /v1/registry
pub async fn list_registry(
    State(state): State<GatewayState>,
) -> Result<Json<Vec<RegistryEntry>>, ApiError> {
    Ok(Json(state.identity.list().await?))
}

#[derive(Debug, Deserialize)]
pub struct EditRegistryRequest {
    pub server_name: String,
}

/// PUT /v1/registry/{identity} -- manual ownership reassignment.
pub async fn edit_registry(
    State(state): State<GatewayState>,
    Path(identity): Path<String>,
    Json(body): Json<EditRegistryRequest>,
) -> Result<StatusCode, ApiError> {
    state.identity.reassign(&identity, &body.server_name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /v1/registry/{identity}
pub async fn delete_registry(
    State(state): State<GatewayState>,
    Path(identity): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.identity.unregister(&identity).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/actions -- submit a cross-tenancy action.
///
/// Self-owned actions execute locally; anything else is relayed to the
/// owning server and its response body is returned unchanged.
pub async fn submit_action(
    State(state): State<GatewayState>,
    Json(action): Json<CrossTenancyAction>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if state.router.is_local(&action.owning_server) {
        let Json(response) = run_action(&state, &action.bot_id, action.action).await?;
        return Ok(Json(serde_json::to_value(response).map_err(|e| {
            FleetError::Internal(format!("action response serialization: {e}"))
        })?));
    }
    Ok(Json(state.router.relay(&action).await?))
}

/// POST /v1/relay -- owner-side execution of a relayed action.
///
/// Only bots this server owns are touched; a relayed action for a foreign
/// record is refused rather than executed.
pub async fn execute_relay(
    State(state): State<GatewayState>,
    Json(request): Json<RelayRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    let bot = state
        .store
        .get_bot(&request.bot_id)
        .await?
        .ok_or_else(|| FleetError::not_found("bot", &request.bot_id))?;
    if bot.server_name != state.server_name {
        return Err(FleetError::not_found("locally-owned bot", &request.bot_id).into());
    }
    run_action(&state, &request.bot_id, request.action).await
}
