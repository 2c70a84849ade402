use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::permissions::Permissions;

// =============================================================================
// Identifiers
// =============================================================================

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

snowflake!(
    /// Chat-platform user identifier.
    UserId
);
snowflake!(
    /// Chat-platform guild (server) identifier.
    GuildId
);
snowflake!(
    /// Chat-platform channel identifier.
    ChannelId
);
snowflake!(
    /// Chat-platform message identifier.
    MessageId
);

/// Identifier tying every log line, audit record and debug report of one
/// invocation together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(pub Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Actors
// =============================================================================

/// The resolved identity behind an inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: UserId,
    /// Effective permissions in the context the event arrived in.
    pub permissions: Permissions,
}

impl Actor {
    pub fn new(id: impl Into<UserId>, permissions: Permissions) -> Self {
        Self {
            id: id.into(),
            permissions,
        }
    }
}
