//! Peer-to-peer audio call signaling orchestrator
//!
//! Drives a single call's lifecycle between two parties over an
//! always-on signaling channel, coordinating offer/answer and
//! connectivity-candidate exchange with a real-time media transport.
//!
//! # Features
//!
//! - **Call state machine**: `Idle → Calling/Ringing → Active → Ended`,
//!   with deterministic teardown on every path out
//! - **Offer/answer negotiation**: one-shot setup guards, safe against
//!   racing triggers
//! - **Candidate queueing**: candidates arriving before the remote
//!   description are buffered and replayed in order, exactly once
//! - **Pluggable seams**: media engine, audio capture, signaling channel
//!   and UI observer are traits; webrtc-rs and WebSocket adapters included
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │  Signaling server (WebSocket)                          │
//! │  ↕ SignalingMessage (JSON, action-tagged)              │
//! │  WebSocketChannel ─→ CallEvent queue                   │
//! │                         ↓                              │
//! │  CallMachine (one CallState, one CallSession)          │
//! │  ├─ NegotiationEngine (offer/answer, one-shot setup)   │
//! │  │   └─ CandidateQueue (replay after remote commit)    │
//! │  ├─ Signaler (best-effort outbound)                    │
//! │  └─ CallObserver (UI / visualization, read-only)       │
//! │                         ↓                              │
//! │  MediaSession (webrtc-rs RTCPeerConnection)            │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use peercall_core::CallConfig;
//!
//! let config = CallConfig::default().with_local_party("alice");
//! assert!(config.validate().is_ok());
//! ```

#![warn(clippy::all)]

pub mod call;
pub mod config;
pub mod error;
pub mod media;
pub mod negotiation;
pub mod signaling;

// Re-exports for public API
pub use call::{
    AudioMonitor, CallEvent, CallHandle, CallMachine, CallObserver, CallRole, CallSession,
    CallSnapshot, CallState,
};
pub use config::{CallConfig, IceServerConfig};
pub use error::{Error, Result};
pub use media::{
    AudioCapture, AudioTrackHandle, IceCandidate, MediaEngine, MediaSession, SessionDescription,
    TransportEvent, TransportState,
};
pub use negotiation::{CandidateQueue, NegotiationEngine};
pub use signaling::{Signaler, SignalingChannel, SignalingMessage, WebSocketChannel};

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
