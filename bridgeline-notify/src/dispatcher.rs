//! Fire-and-forget notification dispatch with bounded retry

use crate::{IncomingCallNotification, LogOnlyNotifier, PushNotifier};
use bridgeline_core::NotificationError;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Retry schedule for a single notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first. Never less than one.
    pub max_attempts: u32,
    /// Delay before the second attempt, doubled after each retry.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
        }
    }

    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

/// Final result of delivering one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { attempts: u32 },
    Failed { attempts: u32, error: NotificationError },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

/// Hands notifications to a [`PushNotifier`] on detached tasks.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn PushNotifier>,
    policy: RetryPolicy,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn PushNotifier>, policy: RetryPolicy) -> Self {
        Self { notifier, policy }
    }

    /// Dispatcher that only logs notifications.
    pub fn log_only() -> Self {
        Self::new(Arc::new(LogOnlyNotifier), RetryPolicy::no_retry())
    }

    pub fn provider(&self) -> &'static str {
        self.notifier.provider()
    }

    /// Spawn delivery and return immediately.
    ///
    /// Must be called from within a tokio runtime. The returned handle may be
    /// dropped; the task keeps running and logs its own outcome.
    pub fn dispatch(
        &self,
        token: impl Into<String>,
        notification: IncomingCallNotification,
    ) -> JoinHandle<DeliveryOutcome> {
        let notifier = Arc::clone(&self.notifier);
        let policy = self.policy.clone();
        let token = token.into();
        tokio::spawn(async move { deliver(notifier.as_ref(), &policy, &token, &notification).await })
    }
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("provider", &self.notifier.provider())
            .field("policy", &self.policy)
            .finish()
    }
}

/// Deliver a notification, retrying transient failures with exponential backoff.
pub async fn deliver(
    notifier: &dyn PushNotifier,
    policy: &RetryPolicy,
    token: &str,
    notification: &IncomingCallNotification,
) -> DeliveryOutcome {
    let provider = notifier.provider();
    let max_attempts = policy.max_attempts.max(1);
    let mut delay = policy.initial_backoff;
    let mut attempt = 1;

    loop {
        match notifier.send(token, notification).await {
            Ok(()) => {
                tracing::info!(
                    provider,
                    from_no = %notification.data.from_no,
                    to_no = %notification.data.to_no,
                    attempt,
                    "Incoming call notification delivered"
                );
                return DeliveryOutcome::Delivered { attempts: attempt };
            }
            Err(error) if error.is_retryable() && attempt < max_attempts => {
                tracing::warn!(
                    provider,
                    to_no = %notification.data.to_no,
                    error = %error,
                    attempt,
                    "Notification delivery failed, retrying"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(error) => {
                tracing::error!(
                    provider,
                    from_no = %notification.data.from_no,
                    to_no = %notification.data.to_no,
                    error = %error,
                    attempts = attempt,
                    "Incoming call notification failed"
                );
                return DeliveryOutcome::Failed {
                    attempts: attempt,
                    error,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IncomingCallData;
    use ::async_trait::async_trait;
    use std::sync::Mutex;

    /// Fails with the queued errors in order, then succeeds.
    #[derive(Default)]
    struct ScriptedNotifier {
        failures: Mutex<Vec<NotificationError>>,
        calls: Mutex<u32>,
    }

    impl ScriptedNotifier {
        fn failing_with(mut failures: Vec<NotificationError>) -> Self {
            failures.reverse();
            Self {
                failures: Mutex::new(failures),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl PushNotifier for ScriptedNotifier {
        fn provider(&self) -> &'static str {
            "scripted"
        }

        async fn send(
            &self,
            _token: &str,
            _notification: &IncomingCallNotification,
        ) -> Result<(), NotificationError> {
            *self.calls.lock().unwrap() += 1;
            match self.failures.lock().unwrap().pop() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    fn notification() -> IncomingCallNotification {
        IncomingCallNotification {
            title: "Call from: A".to_string(),
            body: "body".to_string(),
            data: IncomingCallData {
                account_id: "acct".to_string(),
                application_id: "app".to_string(),
                from_no: "A".to_string(),
                to_no: "B".to_string(),
            },
        }
    }

    fn transient() -> NotificationError {
        NotificationError::Transport {
            provider: "scripted".to_string(),
            reason: "connection reset".to_string(),
        }
    }

    fn permanent() -> NotificationError {
        NotificationError::RequestFailed {
            provider: "scripted".to_string(),
            status: 400,
            message: "INVALID_ARGUMENT".to_string(),
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_deliver_first_try() {
        let notifier = ScriptedNotifier::default();
        let outcome = deliver(&notifier, &fast_policy(), "token", &notification()).await;
        assert_eq!(outcome, DeliveryOutcome::Delivered { attempts: 1 });
    }

    #[tokio::test]
    async fn test_deliver_retries_transient_errors() {
        let notifier = ScriptedNotifier::failing_with(vec![transient(), transient()]);
        let outcome = deliver(&notifier, &fast_policy(), "token", &notification()).await;
        assert_eq!(outcome, DeliveryOutcome::Delivered { attempts: 3 });
        assert_eq!(notifier.calls(), 3);
    }

    #[tokio::test]
    async fn test_deliver_gives_up_after_max_attempts() {
        let notifier =
            ScriptedNotifier::failing_with(vec![transient(), transient(), transient(), transient()]);
        let outcome = deliver(&notifier, &fast_policy(), "token", &notification()).await;
        assert!(matches!(outcome, DeliveryOutcome::Failed { attempts: 3, .. }));
        assert_eq!(notifier.calls(), 3);
    }

    #[tokio::test]
    async fn test_deliver_does_not_retry_client_errors() {
        let notifier = ScriptedNotifier::failing_with(vec![permanent()]);
        let outcome = deliver(&notifier, &fast_policy(), "token", &notification()).await;
        assert_eq!(
            outcome,
            DeliveryOutcome::Failed {
                attempts: 1,
                error: permanent()
            }
        );
        assert_eq!(notifier.calls(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_runs_detached() {
        let notifier = Arc::new(ScriptedNotifier::failing_with(vec![transient()]));
        let dispatcher = NotificationDispatcher::new(notifier.clone(), fast_policy());

        let handle = dispatcher.dispatch("token", notification());
        let outcome = handle.await.unwrap();

        assert!(outcome.is_delivered());
        assert_eq!(notifier.calls(), 2);
    }

    #[tokio::test]
    async fn test_log_only_dispatcher() {
        let dispatcher = NotificationDispatcher::log_only();
        assert_eq!(dispatcher.provider(), "log");
        let outcome = dispatcher.dispatch("token", notification()).await.unwrap();
        assert_eq!(outcome, DeliveryOutcome::Delivered { attempts: 1 });
    }

    #[test]
    fn test_retry_policy_floor() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
        assert_eq!(RetryPolicy::default().max_attempts, 3);
        assert_eq!(RetryPolicy::default().initial_backoff, Duration::from_secs(1));
    }
}
