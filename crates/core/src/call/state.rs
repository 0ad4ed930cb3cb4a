//! Call state and role types

use serde::{Deserialize, Serialize};

/// Lifecycle state of the (single) call
///
/// Exactly one value is current at any time, owned by the call machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    /// No call in progress
    Idle,
    /// Outgoing call placed, waiting for the remote party to answer
    Calling,
    /// Incoming invitation, waiting for the local user to answer
    Ringing,
    /// Call established (negotiation may still be completing)
    Active,
    /// Call over; lingers briefly before resetting to `Idle`
    Ended,
}

impl CallState {
    /// Whether a call attempt is in flight or established
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            CallState::Calling | CallState::Ringing | CallState::Active
        )
    }
}

/// Which side of the call this endpoint is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallRole {
    /// Placed the call; drives negotiation as the offerer
    Caller,
    /// Received the call; answers the offer
    Callee,
}
