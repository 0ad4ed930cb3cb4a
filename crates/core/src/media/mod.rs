//! Media transport capability seams
//!
//! The underlying capture/transport engine is external to this crate; the
//! orchestrator drives it through the traits here. [`MediaEngine`] creates
//! one [`MediaSession`] per call, the session reports connectivity
//! candidates, remote tracks and connection-state changes through a
//! [`TransportEvent`] channel, and [`AudioCapture`] yields local audio
//! tracks. A webrtc-rs backed implementation lives in [`webrtc`](crate::media::webrtc).

pub mod webrtc;

use crate::config::IceServerConfig;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Kind discriminant of a session description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptionKind {
    /// Offered by the negotiation initiator
    Offer,
    /// Produced in response to an offer
    Answer,
}

/// A session description exchanged during offer/answer negotiation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDescription {
    /// Whether this description is an offer or an answer
    #[serde(rename = "type")]
    pub kind: DescriptionKind,

    /// SDP payload
    pub sdp: String,
}

impl SessionDescription {
    /// An offer description
    pub fn offer(sdp: String) -> Self {
        Self {
            kind: DescriptionKind::Offer,
            sdp,
        }
    }

    /// An answer description
    pub fn answer(sdp: String) -> Self {
        Self {
            kind: DescriptionKind::Answer,
            sdp,
        }
    }
}

/// A connectivity candidate exchanged to establish the media path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IceCandidate {
    /// Candidate string
    pub candidate: String,

    /// SDP media line identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,

    /// SDP media line index
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdp_mline_index: Option<u16>,
}

/// Connection state reported by the media transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// Initial state
    New,
    /// Negotiation/connectivity checks in progress
    Connecting,
    /// Media path established
    Connected,
    /// Media path lost
    Disconnected,
    /// Connectivity establishment failed
    Failed,
    /// Session closed locally
    Closed,
}

impl TransportState {
    /// States that terminate the call from the transport side
    pub fn is_failure(&self) -> bool {
        matches!(self, TransportState::Disconnected | TransportState::Failed)
    }
}

/// Events emitted by a media session back into the call machine
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A locally gathered connectivity candidate to forward to the peer
    LocalCandidate(IceCandidate),
    /// The remote audio track arrived
    RemoteTrack(Arc<dyn AudioTrackHandle>),
    /// The transport connection state changed
    StateChanged(TransportState),
}

/// Handle to a single audio track, local or remote
pub trait AudioTrackHandle: fmt::Debug + Send + Sync {
    /// Track identifier
    fn id(&self) -> &str;

    /// Enable or disable the track (mute). Producers and consumers of
    /// track data consult this flag.
    fn set_enabled(&self, enabled: bool);

    /// Whether the track is currently enabled
    fn is_enabled(&self) -> bool;

    /// Stop the track; further data is discarded. Idempotent.
    fn stop(&self);

    /// Downcast support for engine-specific adapters
    fn as_any(&self) -> &dyn Any;
}

/// Locally captured audio tracks, owned by the call session
pub type LocalTracks = Vec<Arc<dyn AudioTrackHandle>>;

/// One media-negotiation/transport session
///
/// Created by a [`MediaEngine`] for the duration of a single call.
#[async_trait]
pub trait MediaSession: Send + Sync {
    /// Produce a session-description offer
    async fn create_offer(&self) -> Result<SessionDescription>;

    /// Produce a session-description answer to a committed remote offer
    async fn create_answer(&self) -> Result<SessionDescription>;

    /// Commit a description locally
    async fn set_local_description(&self, desc: SessionDescription) -> Result<()>;

    /// Commit the peer's description
    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()>;

    /// Whether a remote description has been committed
    async fn has_remote_description(&self) -> bool;

    /// Apply a connectivity candidate from the peer
    ///
    /// Callers must not invoke this before the remote description is
    /// committed; earlier candidates belong in the pending queue.
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    /// Attach local tracks for sending
    ///
    /// Returns the number of tracks attached; returns 0 without touching
    /// the session when senders are already present.
    async fn attach_local_tracks(&self, tracks: &[Arc<dyn AudioTrackHandle>]) -> Result<usize>;

    /// Number of local track senders currently attached
    async fn sender_count(&self) -> usize;

    /// Close the session and release the media path. Idempotent.
    async fn close(&self) -> Result<()>;
}

/// Factory for media sessions
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Create a new session configured with the given ICE servers
    ///
    /// The session reports candidates, remote tracks and state changes
    /// through `events` for as long as it is alive.
    async fn create_session(
        &self,
        ice_servers: &[IceServerConfig],
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Arc<dyn MediaSession>>;
}

/// Local audio capture capability
#[async_trait]
pub trait AudioCapture: Send + Sync {
    /// Acquire local audio tracks
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Permission`](crate::Error::Permission) when
    /// capture is denied.
    async fn acquire_audio(&self) -> Result<LocalTracks>;
}
