//! Coordinator configuration
//!
//! Values are loaded from environment variables with defaults matching the
//! prompts and hold times the telephony flow has always used.

use std::time::Duration;

/// Default lease on a pending pairing.
pub const DEFAULT_PAIRING_TTL: Duration = Duration::from_secs(120);

/// Prompts, hold times and pairing lease used by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Pause played before bridging a second leg.
    pub bridge_pause_secs: u32,
    /// Sentence spoken before bridging.
    pub bridge_prompt: String,
    /// Sentence spoken to a first leg while it waits.
    pub hold_prompt: String,
    /// Pause holding a first leg open for the reciprocal call.
    pub hold_pause_secs: u32,
    /// Lease on a pending pairing. `None` disables expiry.
    pub pairing_ttl: Option<Duration>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            bridge_pause_secs: 5,
            bridge_prompt: "Agent connected successfully".to_string(),
            hold_prompt: "Please wait while we are connecting your call".to_string(),
            hold_pause_secs: 60,
            pairing_ttl: Some(DEFAULT_PAIRING_TTL),
        }
    }
}

impl CoordinatorConfig {
    /// Create CoordinatorConfig from environment variables.
    ///
    /// Environment variables:
    /// - `BRIDGELINE_BRIDGE_PAUSE_SECS`: Pause before bridging (default: 5)
    /// - `BRIDGELINE_BRIDGE_PROMPT`: Sentence spoken before bridging
    /// - `BRIDGELINE_HOLD_PROMPT`: Sentence spoken to a waiting first leg
    /// - `BRIDGELINE_HOLD_PAUSE_SECS`: Hold time for a first leg (default: 60)
    /// - `BRIDGELINE_PAIRING_TTL_SECS`: Pairing lease, 0 disables expiry (default: 120)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bridge_pause_secs = std::env::var("BRIDGELINE_BRIDGE_PAUSE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.bridge_pause_secs);

        let bridge_prompt =
            std::env::var("BRIDGELINE_BRIDGE_PROMPT").unwrap_or(defaults.bridge_prompt);

        let hold_prompt = std::env::var("BRIDGELINE_HOLD_PROMPT").unwrap_or(defaults.hold_prompt);

        let hold_pause_secs = std::env::var("BRIDGELINE_HOLD_PAUSE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.hold_pause_secs);

        let pairing_ttl = match std::env::var("BRIDGELINE_PAIRING_TTL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.pairing_ttl,
        };

        Self {
            bridge_pause_secs,
            bridge_prompt,
            hold_prompt,
            hold_pause_secs,
            pairing_ttl,
        }
    }

    pub fn without_expiry(mut self) -> Self {
        self.pairing_ttl = None;
        self
    }
}
