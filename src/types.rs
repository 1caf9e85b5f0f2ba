//! Basic type definitions for the relay hub
//!
//! Provides the `ClientId` newtype: the process-unique numeric identity
//! the registry assigns to every registered client.

use serde::{Deserialize, Serialize};

/// Unique client identifier (newtype pattern)
///
/// Wraps the `u64` assigned by the registry at registration time.
/// Serializes transparently, so the wire sees a plain unsigned number.
/// The value `0` is reserved as the "unset" sentinel: an inbound envelope
/// carrying a zero sender is stamped with the receiving client's own
/// identity before dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub u64);

impl ClientId {
    /// The unassigned/sentinel identity.
    pub const UNSET: ClientId = ClientId(0);

    /// Check whether this identity has been assigned yet.
    pub fn is_unset(&self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
