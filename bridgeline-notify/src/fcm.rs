//! Firebase Cloud Messaging HTTP v1 notifier

use crate::{IncomingCallNotification, PushNotifier, RetryPolicy};
use ::async_trait::async_trait;
use bridgeline_core::{ConfigError, NotificationError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const PROVIDER: &str = "fcm";
const DEFAULT_ENDPOINT: &str = "https://fcm.googleapis.com";

// ============================================================================
// CONFIGURATION
// ============================================================================

/// FCM transport configuration.
#[derive(Clone)]
pub struct FcmConfig {
    /// Firebase project the device tokens belong to.
    pub project_id: String,
    /// OAuth2 bearer token for the FCM HTTP v1 API, minted externally.
    pub access_token: String,
    /// Base URL of the FCM API.
    pub endpoint: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Delivery attempts per notification, including the first.
    pub max_attempts: u32,
}

impl FcmConfig {
    pub fn new(project_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            access_token: access_token.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(10),
            max_attempts: 3,
        }
    }

    /// Create FcmConfig from environment variables.
    ///
    /// Returns `Ok(None)` when no project is configured.
    ///
    /// Environment variables:
    /// - `BRIDGELINE_FCM_PROJECT_ID`: Firebase project ID
    /// - `BRIDGELINE_FCM_ACCESS_TOKEN`: Bearer token (required when a project is set)
    /// - `BRIDGELINE_FCM_ENDPOINT`: API base URL (default: https://fcm.googleapis.com)
    /// - `BRIDGELINE_FCM_TIMEOUT_SECS`: Request timeout (default: 10)
    /// - `BRIDGELINE_FCM_MAX_ATTEMPTS`: Delivery attempts (default: 3)
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let project_id = match std::env::var("BRIDGELINE_FCM_PROJECT_ID") {
            Ok(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => return Ok(None),
        };

        let access_token = std::env::var("BRIDGELINE_FCM_ACCESS_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingRequired {
                field: "BRIDGELINE_FCM_ACCESS_TOKEN".to_string(),
            })?;

        let mut config = Self::new(project_id, access_token);

        if let Ok(endpoint) = std::env::var("BRIDGELINE_FCM_ENDPOINT") {
            config.endpoint = endpoint.trim_end_matches('/').to_string();
        }

        if let Ok(raw) = std::env::var("BRIDGELINE_FCM_TIMEOUT_SECS") {
            let secs = raw.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                field: "BRIDGELINE_FCM_TIMEOUT_SECS".to_string(),
                value: raw.clone(),
                reason: "must be a whole number of seconds".to_string(),
            })?;
            config.request_timeout = Duration::from_secs(secs);
        }

        if let Ok(raw) = std::env::var("BRIDGELINE_FCM_MAX_ATTEMPTS") {
            config.max_attempts = match raw.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: "BRIDGELINE_FCM_MAX_ATTEMPTS".to_string(),
                        value: raw,
                        reason: "must be a positive integer".to_string(),
                    })
                }
            };
        }

        Ok(Some(config))
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Retry schedule matching `max_attempts`, starting at one second.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_secs(1))
    }

    fn send_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/messages:send",
            self.endpoint, self.project_id
        )
    }
}

impl std::fmt::Debug for FcmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FcmConfig")
            .field("project_id", &self.project_id)
            .field("access_token", &"[REDACTED]")
            .field("endpoint", &self.endpoint)
            .field("request_timeout", &self.request_timeout)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    message: Message<'a>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    token: &'a str,
    notification: MessageNotification<'a>,
    data: &'a crate::IncomingCallData,
}

#[derive(Debug, Serialize)]
struct MessageNotification<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

// ============================================================================
// NOTIFIER
// ============================================================================

/// Sends notifications through the FCM HTTP v1 `messages:send` endpoint.
pub struct FcmNotifier {
    client: Client,
    config: FcmConfig,
}

impl FcmNotifier {
    pub fn new(config: FcmConfig) -> Result<Self, NotificationError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| NotificationError::Transport {
                provider: PROVIDER.to_string(),
                reason: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FcmConfig {
        &self.config
    }
}

impl std::fmt::Debug for FcmNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FcmNotifier")
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl PushNotifier for FcmNotifier {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    async fn send(
        &self,
        token: &str,
        notification: &IncomingCallNotification,
    ) -> Result<(), NotificationError> {
        let body = SendRequest {
            message: Message {
                token,
                notification: MessageNotification {
                    title: &notification.title,
                    body: &notification.body,
                },
                data: &notification.data,
            },
        };

        let response = self
            .client
            .post(self.config.send_url())
            .bearer_auth(&self.config.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotificationError::Transport {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            let sent: SendResponse =
                response
                    .json()
                    .await
                    .map_err(|e| NotificationError::InvalidResponse {
                        provider: PROVIDER.to_string(),
                        reason: format!("Failed to parse response: {}", e),
                    })?;
            tracing::debug!(message_name = %sent.name, "FCM accepted notification");
            return Ok(());
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let message = match serde_json::from_str::<ErrorEnvelope>(&error_text) {
            Ok(envelope) => match envelope.error.status {
                Some(code) => format!("{}: {}", code, envelope.error.message),
                None => envelope.error.message,
            },
            Err(_) => error_text,
        };

        Err(NotificationError::RequestFailed {
            provider: PROVIDER.to_string(),
            status: status.as_u16(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IncomingCallData;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notification() -> IncomingCallNotification {
        IncomingCallNotification {
            title: "Call from: A".to_string(),
            body: "You are getting a call from: A please go back to the tab and answer it"
                .to_string(),
            data: IncomingCallData {
                account_id: "acct".to_string(),
                application_id: "app".to_string(),
                from_no: "A".to_string(),
                to_no: "B".to_string(),
            },
        }
    }

    fn notifier(server: &MockServer) -> FcmNotifier {
        FcmNotifier::new(FcmConfig::new("demo-project", "secret-token").with_endpoint(server.uri()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_send_posts_v1_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/projects/demo-project/messages:send"))
            .and(header("authorization", "Bearer secret-token"))
            .and(body_json(serde_json::json!({
                "message": {
                    "token": "device-1",
                    "notification": {
                        "title": "Call from: A",
                        "body": "You are getting a call from: A please go back to the tab and answer it"
                    },
                    "data": {
                        "accountId": "acct",
                        "applicationId": "app",
                        "fromNo": "A",
                        "toNo": "B"
                    }
                }
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"name": "projects/demo-project/messages/1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        notifier(&server)
            .send("device-1", &notification())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_send_maps_error_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": {"code": 404, "message": "Requested entity was not found.", "status": "NOT_FOUND"}
            })))
            .mount(&server)
            .await;

        let err = notifier(&server)
            .send("stale-token", &notification())
            .await
            .unwrap_err();
        match err {
            NotificationError::RequestFailed {
                status, message, ..
            } => {
                assert_eq!(status, 404);
                assert!(message.contains("NOT_FOUND"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let err = notifier(&server)
            .send("device-1", &notification())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = FcmConfig::new("demo-project", "secret-token");
        let debug = format!("{:?}", config);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("secret-token"));
    }
}
