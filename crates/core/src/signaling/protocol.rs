//! Wire protocol for the signaling channel
//!
//! One JSON object per message, discriminated by an `action` field.
//! Unrecognized actions decode to `None` so newer peers can add message
//! kinds without breaking older ones.

use crate::media::{IceCandidate, SessionDescription};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Actions this endpoint understands
const KNOWN_ACTIONS: &[&str] = &[
    "call",
    "incoming_call",
    "accept",
    "call_accepted",
    "reject",
    "call_rejected",
    "offer",
    "answer",
    "ice_candidate",
    "end_call",
];

/// Call-control and negotiation messages exchanged over the channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SignalingMessage {
    /// Request a new call with the target party
    Call {
        /// Remote party to ring
        target_user: String,
    },

    /// A call invitation, delivered to the callee
    IncomingCall {
        /// Identity of the calling party
        caller_id: String,
        /// Display name of the calling party
        caller_name: String,
    },

    /// Accept an invitation
    Accept {
        /// Identity of the calling party being accepted
        caller_id: String,
    },

    /// The remote party accepted our call
    CallAccepted,

    /// Decline an invitation
    Reject {
        /// Party whose invitation is declined
        target_user: String,
    },

    /// The remote party declined our call
    CallRejected,

    /// Session-description offer
    Offer {
        /// Remote party
        target_user: String,
        /// The offered description
        offer: SessionDescription,
    },

    /// Session-description answer
    Answer {
        /// Remote party
        target_user: String,
        /// The answering description
        answer: SessionDescription,
    },

    /// Connectivity candidate exchange
    IceCandidate {
        /// Remote party
        target_user: String,
        /// Candidate payload
        candidate: IceCandidate,
    },

    /// Terminate the call
    EndCall {
        /// Remote party
        target_user: String,
    },
}

impl SignalingMessage {
    /// Serialize to the wire format
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| Error::Serialization(format!("Failed to serialize message: {}", e)))
    }

    /// Parse a wire message
    ///
    /// Returns `Ok(None)` for well-formed messages with an unrecognized
    /// `action`; callers log and ignore those.
    pub fn decode(text: &str) -> Result<Option<Self>> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| Error::Serialization(format!("Malformed message: {}", e)))?;

        let action = value
            .get("action")
            .and_then(|a| a.as_str())
            .ok_or_else(|| Error::Serialization("Message has no action field".to_string()))?
            .to_string();

        if !KNOWN_ACTIONS.contains(&action.as_str()) {
            return Ok(None);
        }

        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| Error::Serialization(format!("Invalid {} message: {}", action, e)))
    }

    /// The wire `action` value of this message
    pub fn action(&self) -> &'static str {
        match self {
            SignalingMessage::Call { .. } => "call",
            SignalingMessage::IncomingCall { .. } => "incoming_call",
            SignalingMessage::Accept { .. } => "accept",
            SignalingMessage::CallAccepted => "call_accepted",
            SignalingMessage::Reject { .. } => "reject",
            SignalingMessage::CallRejected => "call_rejected",
            SignalingMessage::Offer { .. } => "offer",
            SignalingMessage::Answer { .. } => "answer",
            SignalingMessage::IceCandidate { .. } => "ice_candidate",
            SignalingMessage::EndCall { .. } => "end_call",
        }
    }
}
