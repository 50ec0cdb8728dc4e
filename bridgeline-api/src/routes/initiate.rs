//! Telephony Callback Routes
//!
//! The platform posts one initiate callback per call leg and expects a BXML
//! document back. Disconnect callbacks are acknowledged and logged.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use bridgeline_core::InitiateRequest;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::state::AppState;

/// POST /initiate - Pair a call leg and return its call-control document
pub async fn initiate(State(state): State<AppState>, body: Bytes) -> ApiResult<Response> {
    let request: InitiateRequest = serde_json::from_slice(&body)?;

    tracing::debug!(
        caller_id = request.caller_id.as_deref().unwrap_or_default(),
        callee_id = request.callee_id.as_deref().unwrap_or_default(),
        leg_id = request.leg_id.as_deref().unwrap_or_default(),
        "Initiate callback received"
    );

    let instructions = state.coordinator.coordinate(request).await?;
    let document = bridgeline_bxml::build(&instructions)?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, bridgeline_bxml::CONTENT_TYPE)],
        document.into_string(),
    )
        .into_response())
}

/// Fields of a disconnect callback worth logging. Everything else is ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectEvent {
    pub call_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub cause: Option<String>,
    pub error_message: Option<String>,
}

/// POST /bandwidth/webhooks/voice/disconnect - Acknowledge a finished leg
pub async fn disconnect(body: Bytes) -> StatusCode {
    match serde_json::from_slice::<DisconnectEvent>(&body) {
        Ok(event) => tracing::info!(
            leg_id = event.call_id.as_deref().unwrap_or_default(),
            caller_id = event.from.as_deref().unwrap_or_default(),
            callee_id = event.to.as_deref().unwrap_or_default(),
            cause = event.cause.as_deref().unwrap_or_default(),
            error_message = ?event.error_message,
            "Call leg disconnected"
        ),
        Err(e) => tracing::warn!(error = %e, "Unreadable disconnect callback"),
    }
    StatusCode::NO_CONTENT
}
