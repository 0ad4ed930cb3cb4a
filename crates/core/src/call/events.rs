//! Events into and out of the call machine
//!
//! Every external stimulus — user action, inbound wire message,
//! transport callback, timer expiry — is a [`CallEvent`] dispatched into
//! [`CallMachine::handle_event`](crate::call::CallMachine::handle_event).
//! Downstream observers (UI, visualization) watch transitions through
//! [`CallObserver`] and feed nothing back except further user actions.

use crate::call::state::{CallRole, CallState};
use crate::media::{AudioTrackHandle, TransportEvent};
use crate::signaling::SignalingMessage;
use crate::Error;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::SystemTime;

/// A single stimulus delivered to the call machine
#[derive(Debug)]
pub enum CallEvent {
    /// Local user places an outgoing call
    PlaceCall {
        /// Remote party identifier
        target_id: String,
        /// Display name, if known
        target_name: Option<String>,
    },
    /// Local user accepts the ringing invitation
    Accept,
    /// Local user declines the ringing invitation
    Reject,
    /// Local user hangs up
    HangUp,
    /// Local user mutes or unmutes the microphone
    SetMuted(bool),
    /// Local user adjusts playback volume (0.0 - 1.0)
    SetVolume(f32),
    /// Inbound message from the signaling channel
    Message(SignalingMessage),
    /// Callback from the media transport
    Transport(TransportEvent),
    /// The `Ended` linger delay elapsed
    ResetElapsed,
    /// Process is going away; end any live call and stop the machine
    Shutdown,
}

/// Snapshot of call state handed to observers on every transition
#[derive(Debug, Clone)]
pub struct CallSnapshot {
    /// Current state
    pub state: CallState,
    /// Side of the call, when one exists
    pub role: Option<CallRole>,
    /// Remote party identifier, when a call exists
    pub remote_party: Option<String>,
    /// Remote display name, if known
    pub remote_display_name: Option<String>,
    /// When the call went active, if it did
    pub started_at: Option<SystemTime>,
}

/// Opaque handle to the downstream audio graph (playback + analysis)
///
/// Returned by the observer when the remote track arrives; owned by the
/// session and shut down on release.
pub trait AudioMonitor: Send {
    /// Adjust playback volume (0.0 - 1.0)
    fn set_volume(&mut self, volume: f32);

    /// Tear down the audio graph. Idempotent.
    fn shutdown(&mut self);
}

/// Downstream observer of call state
///
/// Notified on every transition; must not block the event loop for long.
#[async_trait]
pub trait CallObserver: Send + Sync {
    /// The call state changed
    async fn on_state_changed(&self, snapshot: CallSnapshot);

    /// An invitation arrived (state is now `Ringing`)
    async fn on_incoming_call(&self, caller_id: &str, caller_name: &str);

    /// The remote audio track arrived
    ///
    /// The observer may return an [`AudioMonitor`] wired to the track;
    /// the session owns it and tears it down on release.
    async fn on_remote_track(
        &self,
        track: Arc<dyn AudioTrackHandle>,
    ) -> Option<Box<dyn AudioMonitor>>;

    /// A fatal or notable error occurred
    async fn on_error(&self, _error: &Error) {}
}
