//! Bridgeline Notify - Incoming-Call Push Notifications
//!
//! Builds the notification payload for a new call, delivers it through a
//! [`PushNotifier`] transport, and runs delivery on detached tasks so the
//! call flow never waits on it.

pub mod dispatcher;
pub mod fcm;
pub mod notification;
pub mod notifier;

pub use dispatcher::{DeliveryOutcome, NotificationDispatcher, RetryPolicy};
pub use fcm::{FcmConfig, FcmNotifier};
pub use notification::{IncomingCallData, IncomingCallNotification};
pub use notifier::{LogOnlyNotifier, PushNotifier};
