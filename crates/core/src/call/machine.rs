//! The call state machine
//!
//! Owns the current [`CallState`] and the single [`CallSession`], and is
//! the only place transitions happen. Every stimulus arrives as a
//! [`CallEvent`]; dispatch is strictly sequential, so handlers never race
//! each other and the machine needs no internal locking.

use crate::call::events::{CallEvent, CallObserver, CallSnapshot};
use crate::call::session::CallSession;
use crate::call::state::CallState;
use crate::config::CallConfig;
use crate::media::{AudioCapture, IceCandidate, MediaEngine, SessionDescription, TransportEvent};
use crate::negotiation::NegotiationEngine;
use crate::signaling::{Signaler, SignalingChannel, SignalingMessage};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Depth of the machine's event queue
const EVENT_QUEUE_DEPTH: usize = 64;

/// Cheap cloneable handle for feeding user actions into the machine
#[derive(Clone)]
pub struct CallHandle {
    tx: mpsc::Sender<CallEvent>,
}

impl CallHandle {
    /// Place an outgoing call
    pub async fn place_call(&self, target_id: &str, target_name: Option<&str>) -> Result<()> {
        self.send(CallEvent::PlaceCall {
            target_id: target_id.to_string(),
            target_name: target_name.map(|name| name.to_string()),
        })
        .await
    }

    /// Accept the ringing invitation
    pub async fn accept(&self) -> Result<()> {
        self.send(CallEvent::Accept).await
    }

    /// Decline the ringing invitation
    pub async fn reject(&self) -> Result<()> {
        self.send(CallEvent::Reject).await
    }

    /// Hang up the current call
    pub async fn hang_up(&self) -> Result<()> {
        self.send(CallEvent::HangUp).await
    }

    /// Mute or unmute the microphone
    pub async fn set_muted(&self, muted: bool) -> Result<()> {
        self.send(CallEvent::SetMuted(muted)).await
    }

    /// Adjust playback volume (0.0 - 1.0)
    pub async fn set_volume(&self, volume: f32) -> Result<()> {
        self.send(CallEvent::SetVolume(volume)).await
    }

    /// End any live call and stop the machine
    pub async fn shutdown(&self) -> Result<()> {
        self.send(CallEvent::Shutdown).await
    }

    /// Raw event sender, for wiring the signaling channel reader
    pub fn sender(&self) -> mpsc::Sender<CallEvent> {
        self.tx.clone()
    }

    async fn send(&self, event: CallEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| Error::Internal("call machine stopped".to_string()))
    }
}

/// Top-level controller for a single call at a time
pub struct CallMachine {
    local_party: String,
    state: CallState,
    session: Option<CallSession>,
    negotiation: NegotiationEngine,
    signaler: Signaler,
    observer: Arc<dyn CallObserver>,
    events: mpsc::Sender<CallEvent>,
    inbox: mpsc::Receiver<CallEvent>,
    ended_linger: Duration,
}

impl CallMachine {
    /// Assemble the machine from its collaborators
    ///
    /// The channel must already be connected; the machine never dials it.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` when the configuration is invalid.
    pub fn new(
        config: CallConfig,
        media: Arc<dyn MediaEngine>,
        capture: Arc<dyn AudioCapture>,
        channel: Arc<dyn SignalingChannel>,
        observer: Arc<dyn CallObserver>,
    ) -> Result<(Self, CallHandle)> {
        config.validate()?;

        let local_party = config
            .local_party
            .clone()
            .unwrap_or_else(|| format!("party-{}", Uuid::new_v4()));

        let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let signaler = Signaler::new(channel);
        let negotiation = NegotiationEngine::new(
            media,
            capture,
            signaler.clone(),
            config.ice_servers.clone(),
            tx.clone(),
        );

        let machine = Self {
            local_party,
            state: CallState::Idle,
            session: None,
            negotiation,
            signaler,
            observer,
            events: tx.clone(),
            inbox: rx,
            ended_linger: Duration::from_millis(config.ended_linger_ms),
        };

        Ok((machine, CallHandle { tx }))
    }

    /// Current call state
    pub fn state(&self) -> CallState {
        self.state
    }

    /// Local party identifier
    pub fn local_party(&self) -> &str {
        &self.local_party
    }

    /// Elapsed time since the call went active
    pub fn call_duration(&self) -> Option<Duration> {
        self.session.as_ref().and_then(|s| s.call_duration())
    }

    /// Snapshot handed to observers
    pub fn snapshot(&self) -> CallSnapshot {
        CallSnapshot {
            state: self.state,
            role: self.session.as_ref().map(|s| s.role),
            remote_party: self.session.as_ref().map(|s| s.remote_party.clone()),
            remote_display_name: self
                .session
                .as_ref()
                .and_then(|s| s.remote_display_name.clone()),
            started_at: self.session.as_ref().and_then(|s| s.started_at),
        }
    }

    /// Process events until shutdown
    pub async fn run(mut self) {
        while let Some(event) = self.inbox.recv().await {
            let stop = matches!(event, CallEvent::Shutdown);
            self.handle_event(event).await;
            if stop {
                break;
            }
        }
        info!("call machine stopped");
    }

    /// Dispatch a single event against the current state
    ///
    /// Public so the transition table is directly testable without a live
    /// channel or transport.
    pub async fn handle_event(&mut self, event: CallEvent) {
        match event {
            CallEvent::PlaceCall {
                target_id,
                target_name,
            } => self.on_place_call(target_id, target_name).await,
            CallEvent::Accept => self.on_accept().await,
            CallEvent::Reject => self.on_reject().await,
            CallEvent::HangUp => self.terminate(true).await,
            CallEvent::SetMuted(muted) => {
                if let Some(session) = &self.session {
                    session.set_muted(muted);
                }
            }
            CallEvent::SetVolume(volume) => {
                if let Some(session) = &mut self.session {
                    if let Some(monitor) = &mut session.monitor {
                        monitor.set_volume(volume.clamp(0.0, 1.0));
                    }
                }
            }
            CallEvent::Message(message) => self.on_message(message).await,
            CallEvent::Transport(event) => self.on_transport(event).await,
            CallEvent::ResetElapsed => self.reset().await,
            CallEvent::Shutdown => {
                if self.state.is_busy() {
                    info!("shutdown requested with live call, ending it");
                    self.terminate(true).await;
                }
            }
        }
    }

    async fn on_place_call(&mut self, target_id: String, target_name: Option<String>) {
        if self.state != CallState::Idle {
            warn!(state = ?self.state, "rejecting concurrent outgoing call attempt");
            self.observer.on_error(&Error::CallInProgress).await;
            return;
        }

        info!(target = %target_id, "placing outgoing call");
        self.session = Some(CallSession::outgoing(
            self.local_party.clone(),
            target_id.clone(),
            target_name,
        ));
        self.transition(CallState::Calling).await;

        // Capture and session come up before the call is announced, so a
        // permission failure aborts without any message on the wire.
        let result = match self.session.as_mut() {
            Some(session) => self.negotiation.prepare_local(session).await,
            None => Ok(()),
        };

        match result {
            Ok(()) => {
                self.signaler
                    .send(&SignalingMessage::Call {
                        target_user: target_id,
                    })
                    .await;
                if let Some(session) = &mut self.session {
                    session.announced = true;
                }
            }
            Err(e) => self.fail(e).await,
        }
    }

    async fn on_accept(&mut self) {
        if self.state != CallState::Ringing {
            debug!(state = ?self.state, "ignoring accept outside Ringing");
            return;
        }
        let caller = match &self.session {
            Some(session) => session.remote_party.clone(),
            None => return,
        };

        info!(caller = %caller, "accepting incoming call");
        self.signaler
            .send(&SignalingMessage::Accept { caller_id: caller })
            .await;
        if let Some(session) = &mut self.session {
            session.announced = true;
            session.mark_active();
        }
        self.transition(CallState::Active).await;

        let result = match self.session.as_mut() {
            Some(session) => self.negotiation.setup_as_answerer(session).await,
            None => Ok(()),
        };
        if let Err(e) = result {
            self.fail(e).await;
        }
    }

    async fn on_reject(&mut self) {
        if self.state != CallState::Ringing {
            debug!(state = ?self.state, "ignoring reject outside Ringing");
            return;
        }
        if let Some(session) = &self.session {
            self.signaler
                .send(&SignalingMessage::Reject {
                    target_user: session.remote_party.clone(),
                })
                .await;
        }
        self.terminate(false).await;
    }

    async fn on_message(&mut self, message: SignalingMessage) {
        match message {
            SignalingMessage::IncomingCall {
                caller_id,
                caller_name,
            } => self.on_incoming_call(caller_id, caller_name).await,
            SignalingMessage::CallAccepted => self.on_call_accepted().await,
            SignalingMessage::CallRejected => {
                if self.state == CallState::Calling {
                    info!("call rejected by remote party");
                    self.terminate(false).await;
                } else {
                    debug!(state = ?self.state, "ignoring call_rejected");
                }
            }
            SignalingMessage::Offer { offer, .. } => self.on_offer(offer).await,
            SignalingMessage::Answer { answer, .. } => self.on_answer(answer).await,
            SignalingMessage::IceCandidate { candidate, .. } => self.on_candidate(candidate).await,
            SignalingMessage::EndCall { .. } => {
                if self.state.is_busy() {
                    info!("remote party ended the call");
                    self.terminate(false).await;
                }
            }
            other => {
                debug!(
                    action = other.action(),
                    "ignoring message not addressed to an endpoint"
                );
            }
        }
    }

    async fn on_incoming_call(&mut self, caller_id: String, caller_name: String) {
        if self.state != CallState::Idle {
            // Busy with another call: explicitly turn the new caller
            // down instead of overwriting the current session.
            warn!(caller = %caller_id, state = ?self.state, "busy, rejecting concurrent call attempt");
            self.signaler
                .send(&SignalingMessage::Reject {
                    target_user: caller_id,
                })
                .await;
            return;
        }

        info!(caller = %caller_id, "incoming call");
        self.session = Some(CallSession::incoming(
            self.local_party.clone(),
            caller_id.clone(),
            caller_name.clone(),
        ));
        self.transition(CallState::Ringing).await;
        self.observer.on_incoming_call(&caller_id, &caller_name).await;
    }

    async fn on_call_accepted(&mut self) {
        if self.state != CallState::Calling {
            debug!(state = ?self.state, "ignoring call_accepted");
            return;
        }

        info!("call accepted, negotiating as offerer");
        if let Some(session) = &mut self.session {
            session.mark_active();
        }
        self.transition(CallState::Active).await;

        let result = match self.session.as_mut() {
            Some(session) => self.negotiation.setup_as_offerer(session).await,
            None => Ok(()),
        };
        if let Err(e) = result {
            self.fail(e).await;
        }
    }

    async fn on_offer(&mut self, offer: SessionDescription) {
        // An offer can legally arrive while still Ringing: the remote
        // side starts negotiating the moment it sees our accept.
        if !matches!(self.state, CallState::Ringing | CallState::Active) {
            debug!(state = ?self.state, "ignoring offer");
            return;
        }
        let result = match self.session.as_mut() {
            Some(session) => self.negotiation.on_remote_offer(session, offer).await,
            None => {
                debug!("ignoring offer with no call in progress");
                Ok(())
            }
        };
        if let Err(e) = result {
            self.fail(e).await;
        }
    }

    async fn on_answer(&mut self, answer: SessionDescription) {
        let result = match self.session.as_mut() {
            Some(session) => self.negotiation.on_remote_answer(session, answer).await,
            None => {
                debug!("ignoring answer with no call in progress");
                Ok(())
            }
        };
        if let Err(e) = result {
            self.fail(e).await;
        }
    }

    async fn on_candidate(&mut self, candidate: IceCandidate) {
        match &mut self.session {
            Some(session) => {
                let transport = session.transport.clone();
                session
                    .pending
                    .handle_incoming(candidate, transport.as_ref())
                    .await;
            }
            None => debug!("discarding candidate with no call in progress"),
        }
    }

    async fn on_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::LocalCandidate(candidate) => {
                if let Some(session) = &self.session {
                    self.signaler
                        .send(&SignalingMessage::IceCandidate {
                            target_user: session.remote_party.clone(),
                            candidate,
                        })
                        .await;
                }
            }
            TransportEvent::RemoteTrack(track) => {
                if let Some(session) = &mut self.session {
                    debug!(track = track.id(), "remote audio track arrived");
                    session.remote_track = Some(Arc::downgrade(&track));
                    session.monitor = self.observer.on_remote_track(track).await;
                }
            }
            TransportEvent::StateChanged(state) => {
                debug!(?state, "transport state changed");
                if state.is_failure() && self.state.is_busy() {
                    warn!(?state, "transport lost, ending call");
                    self.terminate(false).await;
                }
            }
        }
    }

    /// Drive the call into `Ended`
    ///
    /// Idempotent: re-entry while already `Ended` (or `Idle`) does
    /// nothing, so a second hang-up never produces a second `end_call`.
    async fn terminate(&mut self, locally_initiated: bool) {
        if !self.state.is_busy() {
            return;
        }

        if locally_initiated {
            if let Some(session) = &self.session {
                if session.announced {
                    self.signaler
                        .send(&SignalingMessage::EndCall {
                            target_user: session.remote_party.clone(),
                        })
                        .await;
                }
            }
        }

        self.transition(CallState::Ended).await;
        if let Some(session) = &mut self.session {
            session.release_all().await;
        }
        self.schedule_reset();
    }

    /// Handle a failure according to its class
    async fn fail(&mut self, error: Error) {
        warn!("call failed: {}", error);
        self.observer.on_error(&error).await;
        if !error.is_fatal() {
            return;
        }
        // The remote party hears end_call only when it was ever told
        // about this call.
        let announced = self.session.as_ref().map(|s| s.announced).unwrap_or(false);
        self.terminate(announced).await;
    }

    /// `Ended` linger elapsed: drop the session and return to `Idle`
    async fn reset(&mut self) {
        if self.state != CallState::Ended {
            debug!(state = ?self.state, "ignoring stale reset timer");
            return;
        }
        if let Some(mut session) = self.session.take() {
            session.release_all().await;
        }
        self.transition(CallState::Idle).await;
        debug!("call fully reset");
    }

    fn schedule_reset(&self) {
        let events = self.events.clone();
        let linger = self.ended_linger;
        tokio::spawn(async move {
            tokio::time::sleep(linger).await;
            let _ = events.send(CallEvent::ResetElapsed).await;
        });
    }

    async fn transition(&mut self, new_state: CallState) {
        let old_state = self.state;
        if old_state == new_state {
            return;
        }
        debug!(?old_state, ?new_state, "call state transition");
        self.state = new_state;
        self.observer.on_state_changed(self.snapshot()).await;
    }
}
