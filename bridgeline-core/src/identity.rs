//! Identity types for Bridgeline records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Agent identity, usually the agent's phone number.
    AgentId
);

string_id!(
    /// Platform-assigned identifier of one call leg.
    LegId
);

string_id!(
    /// Ordered `"<first>-<second>"` encoding of two agent identities.
    ///
    /// A first leg from A to B stores `PairingKey::between(B, A)` on A's record: the
    /// direction of the reply leg it is waiting for. The reply leg from B to A
    /// computes `PairingKey::between(B, A)` from its own caller and callee and finds
    /// the waiting record with an index lookup.
    PairingKey
);

impl PairingKey {
    /// Key for a leg travelling from `first` to `second`.
    pub fn between(first: &AgentId, second: &AgentId) -> Self {
        Self(format!("{}-{}", first, second))
    }
}
