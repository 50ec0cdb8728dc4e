//! Agent Routes
//!
//! The softphone registers the device token the coordinator addresses when
//! a call comes in. Records can be read back for diagnostics.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use bridgeline_core::AgentRecord;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Request body for registering a push token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterPushTokenRequest {
    pub token: String,
}

/// PUT /agents/:agent_id/push-token
pub async fn register_push_token(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    Json(req): Json<RegisterPushTokenRequest>,
) -> ApiResult<StatusCode> {
    state
        .coordinator
        .register_push_token(&agent_id, &req.token)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /agents/:agent_id
pub async fn get_agent(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> ApiResult<Json<AgentRecord>> {
    state
        .coordinator
        .agent(&agent_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::agent_not_found(&agent_id))
}

/// Create the agents router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/:agent_id", get(get_agent))
        .route("/:agent_id/push-token", put(register_push_token))
}
