//! Call-control instructions returned to the telephony platform

use crate::LegId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of the call flow. Sequences execute in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallControlInstruction {
    /// Hold the leg silently.
    Pause { duration_seconds: u32 },
    /// Play synthesized speech.
    Speak { text: String },
    /// Connect this leg's media to another leg.
    Bridge { target_leg_id: LegId },
}

impl CallControlInstruction {
    pub fn pause(duration_seconds: u32) -> Self {
        Self::Pause { duration_seconds }
    }

    pub fn speak(text: impl Into<String>) -> Self {
        Self::Speak { text: text.into() }
    }

    pub fn bridge(target_leg_id: LegId) -> Self {
        Self::Bridge { target_leg_id }
    }

    pub fn is_bridge(&self) -> bool {
        matches!(self, Self::Bridge { .. })
    }
}

impl fmt::Display for CallControlInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pause { duration_seconds } => write!(f, "Pause({})", duration_seconds),
            Self::Speak { text } => write!(f, "Speak({:?})", text),
            Self::Bridge { target_leg_id } => write!(f, "Bridge({})", target_leg_id),
        }
    }
}
