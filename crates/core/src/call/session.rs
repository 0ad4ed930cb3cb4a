//! The aggregate for one call attempt
//!
//! At most one `CallSession` exists at a time. It owns the media session
//! handle, the captured local tracks and the pending-candidate queue;
//! the remote track is held weakly because the transport layer owns it.

use crate::call::events::AudioMonitor;
use crate::call::state::CallRole;
use crate::media::{AudioTrackHandle, LocalTracks, MediaSession};
use crate::negotiation::CandidateQueue;
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};
use uuid::Uuid;

/// State for a single call attempt, created on initiate or accept and
/// destroyed once the call has fully reset to idle
pub struct CallSession {
    /// Unique identifier for this attempt
    pub id: Uuid,

    /// Local party identifier
    pub local_party: String,

    /// Remote party identifier
    pub remote_party: String,

    /// Remote display name, if known
    pub remote_display_name: Option<String>,

    /// Which side of the call we are on
    pub role: CallRole,

    /// Set once, on the transition into `Active`
    pub started_at: Option<SystemTime>,

    /// Handle to the media-negotiation/transport session
    pub transport: Option<Arc<dyn MediaSession>>,

    /// Captured local audio tracks
    pub local_tracks: Option<LocalTracks>,

    /// Remote audio track; owned by the transport layer, never by us
    pub remote_track: Option<Weak<dyn AudioTrackHandle>>,

    /// Downstream audio graph handle registered by the observer
    pub monitor: Option<Box<dyn AudioMonitor>>,

    /// Candidates waiting for the remote description
    pub pending: CandidateQueue,

    /// Whether the remote party has been told about this call
    /// (`call` or `accept` went out)
    pub(crate) announced: bool,

    /// One-shot guard: local tracks attached to the transport
    pub(crate) tracks_attached: bool,

    /// One-shot guard: a local offer has been committed
    pub(crate) local_offer_committed: bool,
}

impl CallSession {
    /// Session for an outgoing call
    pub fn outgoing(
        local_party: String,
        remote_party: String,
        remote_display_name: Option<String>,
    ) -> Self {
        Self::new(local_party, remote_party, remote_display_name, CallRole::Caller)
    }

    /// Session for an accepted invitation
    pub fn incoming(local_party: String, caller_id: String, caller_name: String) -> Self {
        Self::new(local_party, caller_id, Some(caller_name), CallRole::Callee)
    }

    fn new(
        local_party: String,
        remote_party: String,
        remote_display_name: Option<String>,
        role: CallRole,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            local_party,
            remote_party,
            remote_display_name,
            role,
            started_at: None,
            transport: None,
            local_tracks: None,
            remote_track: None,
            monitor: None,
            pending: CandidateQueue::new(),
            announced: false,
            tracks_attached: false,
            local_offer_committed: false,
        }
    }

    /// Record the activation instant; later calls are no-ops
    pub fn mark_active(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(SystemTime::now());
        }
    }

    /// Elapsed time since the call went active
    pub fn call_duration(&self) -> Option<Duration> {
        self.started_at.and_then(|started| started.elapsed().ok())
    }

    /// Enable or disable every local track
    pub fn set_muted(&self, muted: bool) {
        if let Some(tracks) = &self.local_tracks {
            for track in tracks {
                track.set_enabled(!muted);
            }
        }
    }

    /// Release every owned resource
    ///
    /// Closes the transport, stops local and (still-alive) remote
    /// tracks, shuts down the audio monitor, clears the candidate
    /// queue. Each step is independently idempotent; calling this any
    /// number of times is equivalent to calling it once.
    pub async fn release_all(&mut self) {
        if let Some(transport) = self.transport.take() {
            debug!(session = %self.id, "closing media session");
            if let Err(e) = transport.close().await {
                warn!(session = %self.id, "error closing media session: {}", e);
            }
        }

        if let Some(tracks) = self.local_tracks.take() {
            for track in &tracks {
                track.stop();
            }
        }

        if let Some(remote) = self.remote_track.take() {
            if let Some(track) = remote.upgrade() {
                track.stop();
            }
        }

        if let Some(mut monitor) = self.monitor.take() {
            monitor.shutdown();
        }

        self.pending.clear();
    }
}
