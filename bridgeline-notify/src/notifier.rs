//! Push transport trait

use crate::IncomingCallNotification;
use ::async_trait::async_trait;
use bridgeline_core::NotificationError;

/// A transport able to deliver one notification to one device token.
#[async_trait]
pub trait PushNotifier: Send + Sync {
    /// Provider name used in logs and errors.
    fn provider(&self) -> &'static str;

    /// Deliver a single notification. Called once per attempt.
    async fn send(
        &self,
        token: &str,
        notification: &IncomingCallNotification,
    ) -> Result<(), NotificationError>;
}

/// Notifier used when no push provider is configured. Logs and succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOnlyNotifier;

#[async_trait]
impl PushNotifier for LogOnlyNotifier {
    fn provider(&self) -> &'static str {
        "log"
    }

    async fn send(
        &self,
        _token: &str,
        notification: &IncomingCallNotification,
    ) -> Result<(), NotificationError> {
        tracing::info!(
            from_no = %notification.data.from_no,
            to_no = %notification.data.to_no,
            title = %notification.title,
            "No push provider configured, notification logged only"
        );
        Ok(())
    }
}
