//! Initiate events delivered by the telephony platform
//!
//! The platform posts one initiate callback per call leg. [`InitiateRequest`]
//! is the decoded wire body with every field optional; [`InitiateEvent`] is the
//! validated form the coordinator works with.

use crate::{AgentId, CallMetadata, LegId, Timestamp, ValidationError};
use serde::{Deserialize, Serialize};

/// Raw initiate callback body.
///
/// Accepts both the explicit field names and the platform's callback names
/// (`from`, `to`, `callId`). Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateRequest {
    pub account_id: Option<String>,
    pub application_id: Option<String>,
    #[serde(alias = "from")]
    pub caller_id: Option<String>,
    #[serde(alias = "to")]
    pub callee_id: Option<String>,
    #[serde(alias = "callId")]
    pub leg_id: Option<String>,
}

/// A validated initiate event for one call leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateEvent {
    pub account_id: String,
    pub application_id: String,
    pub caller_id: AgentId,
    pub callee_id: AgentId,
    pub leg_id: LegId,
}

impl InitiateEvent {
    /// Metadata recorded on the callee's behalf.
    pub fn call_metadata(&self, received_at: Timestamp) -> CallMetadata {
        CallMetadata {
            account_id: self.account_id.clone(),
            application_id: self.application_id.clone(),
            caller_id: self.caller_id.clone(),
            callee_id: self.callee_id.clone(),
            received_at,
        }
    }

    pub fn is_self_call(&self) -> bool {
        self.caller_id == self.callee_id
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, ValidationError> {
    let value = value.ok_or_else(|| ValidationError::RequiredFieldMissing {
        field: field.to_string(),
    })?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            reason: "must not be blank".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

impl TryFrom<InitiateRequest> for InitiateEvent {
    type Error = ValidationError;

    fn try_from(req: InitiateRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            account_id: required(req.account_id, "accountId")?,
            application_id: required(req.application_id, "applicationId")?,
            caller_id: AgentId::new(required(req.caller_id, "callerId")?),
            callee_id: AgentId::new(required(req.callee_id, "calleeId")?),
            leg_id: LegId::new(required(req.leg_id, "legId")?),
        })
    }
}

impl From<InitiateEvent> for InitiateRequest {
    fn from(event: InitiateEvent) -> Self {
        Self {
            account_id: Some(event.account_id),
            application_id: Some(event.application_id),
            caller_id: Some(event.caller_id.into_inner()),
            callee_id: Some(event.callee_id.into_inner()),
            leg_id: Some(event.leg_id.into_inner()),
        }
    }
}
