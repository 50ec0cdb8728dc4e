//! Incoming-call notification payload

use bridgeline_core::CallMetadata;
use serde::{Deserialize, Serialize};

/// Data block carried alongside the visible notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingCallData {
    pub account_id: String,
    pub application_id: String,
    pub from_no: String,
    pub to_no: String,
}

/// Push message telling an agent that someone is calling them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingCallNotification {
    pub title: String,
    pub body: String,
    pub data: IncomingCallData,
}

impl IncomingCallNotification {
    pub fn for_call(metadata: &CallMetadata) -> Self {
        let caller = metadata.caller_id.as_str();
        Self {
            title: format!("Call from: {}", caller),
            body: format!(
                "You are getting a call from: {} please go back to the tab and answer it",
                caller
            ),
            data: IncomingCallData {
                account_id: metadata.account_id.clone(),
                application_id: metadata.application_id.clone(),
                from_no: caller.to_string(),
                to_no: metadata.callee_id.as_str().to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridgeline_core::AgentId;
    use chrono::Utc;

    fn metadata() -> CallMetadata {
        CallMetadata {
            account_id: "acct-1".to_string(),
            application_id: "app-1".to_string(),
            caller_id: AgentId::from("+15550001"),
            callee_id: AgentId::from("+15550002"),
            received_at: Utc::now(),
        }
    }

    #[test]
    fn test_for_call_text() {
        let notification = IncomingCallNotification::for_call(&metadata());
        assert_eq!(notification.title, "Call from: +15550001");
        assert_eq!(
            notification.body,
            "You are getting a call from: +15550001 please go back to the tab and answer it"
        );
    }

    #[test]
    fn test_data_serializes_camel_case() {
        let notification = IncomingCallNotification::for_call(&metadata());
        let json = serde_json::to_value(&notification.data).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "accountId": "acct-1",
                "applicationId": "app-1",
                "fromNo": "+15550001",
                "toNo": "+15550002",
            })
        );
    }
}
