//! Offer/answer negotiation
//!
//! Drives the media session through the handshake exactly once per call.
//! Session and track acquisition are one-shot: the same setup step can be
//! reached from several code paths (an inbound offer racing a local
//! accept) and must not run twice.

mod candidates;

pub use candidates::CandidateQueue;

use crate::call::{CallEvent, CallSession};
use crate::config::IceServerConfig;
use crate::media::{AudioCapture, MediaEngine, MediaSession, SessionDescription};
use crate::signaling::{Signaler, SignalingMessage};
use crate::{Error, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Depth of the per-session transport event channel
const TRANSPORT_EVENT_DEPTH: usize = 64;

/// Produces and consumes session descriptions for the current call
pub struct NegotiationEngine {
    media: Arc<dyn MediaEngine>,
    capture: Arc<dyn AudioCapture>,
    signaler: Signaler,
    ice_servers: Vec<IceServerConfig>,
    events: mpsc::Sender<CallEvent>,
}

impl NegotiationEngine {
    /// Wire the engine to its collaborators
    ///
    /// `events` receives the transport callbacks of every session this
    /// engine creates, as [`CallEvent::Transport`].
    pub fn new(
        media: Arc<dyn MediaEngine>,
        capture: Arc<dyn AudioCapture>,
        signaler: Signaler,
        ice_servers: Vec<IceServerConfig>,
        events: mpsc::Sender<CallEvent>,
    ) -> Self {
        Self {
            media,
            capture,
            signaler,
            ice_servers,
            events,
        }
    }

    /// Acquire local media and create the media session, without
    /// producing a description yet
    ///
    /// Used when placing an outgoing call: the session must exist (and
    /// be gathering candidates) before the remote party answers.
    pub async fn prepare_local(&self, session: &mut CallSession) -> Result<()> {
        let transport = self.ensure_transport(session).await?;
        self.ensure_local_media(session, &transport).await
    }

    /// Run the offering side of the handshake
    ///
    /// Ensures the session and local tracks exist, commits an offer
    /// locally and emits it to the remote party.
    pub async fn setup_as_offerer(&self, session: &mut CallSession) -> Result<()> {
        let transport = self.ensure_transport(session).await?;
        self.ensure_local_media(session, &transport).await?;

        if session.local_offer_committed {
            debug!(session = %session.id, "offer already committed, skipping");
            return Ok(());
        }

        let offer = transport
            .create_offer()
            .await
            .map_err(|e| Error::Negotiation(format!("failed to create offer: {}", e)))?;
        transport
            .set_local_description(offer.clone())
            .await
            .map_err(|e| Error::Negotiation(format!("failed to commit local offer: {}", e)))?;
        session.local_offer_committed = true;

        self.signaler
            .send(&SignalingMessage::Offer {
                target_user: session.remote_party.clone(),
                offer,
            })
            .await;

        Ok(())
    }

    /// Run the answering side of the handshake, up to the point where
    /// the remote offer arrives
    pub async fn setup_as_answerer(&self, session: &mut CallSession) -> Result<()> {
        let transport = self.ensure_transport(session).await?;
        self.ensure_local_media(session, &transport).await
    }

    /// Handle the remote party's offer
    ///
    /// Creates the media session first when none exists (the offer can
    /// arrive before local setup ran), commits the offer, replays every
    /// queued candidate, then commits and emits the answer. The queue
    /// flush is awaited before the answer is produced, so ordering is
    /// enforced structurally rather than by timing.
    pub async fn on_remote_offer(
        &self,
        session: &mut CallSession,
        offer: SessionDescription,
    ) -> Result<()> {
        let transport = self.ensure_transport(session).await?;
        self.ensure_local_media(session, &transport).await?;

        transport
            .set_remote_description(offer)
            .await
            .map_err(|e| Error::Negotiation(format!("failed to commit remote offer: {}", e)))?;

        session.pending.drain_into(&transport).await;

        let answer = transport
            .create_answer()
            .await
            .map_err(|e| Error::Negotiation(format!("failed to create answer: {}", e)))?;
        transport
            .set_local_description(answer.clone())
            .await
            .map_err(|e| Error::Negotiation(format!("failed to commit local answer: {}", e)))?;

        self.signaler
            .send(&SignalingMessage::Answer {
                target_user: session.remote_party.clone(),
                answer,
            })
            .await;

        Ok(())
    }

    /// Handle the remote party's answer to our offer
    pub async fn on_remote_answer(
        &self,
        session: &mut CallSession,
        answer: SessionDescription,
    ) -> Result<()> {
        if !session.local_offer_committed {
            return Err(Error::Negotiation(
                "answer received with no outstanding offer".to_string(),
            ));
        }

        let transport = session.transport.clone().ok_or_else(|| {
            Error::Negotiation("answer received with no media session".to_string())
        })?;

        transport
            .set_remote_description(answer)
            .await
            .map_err(|e| Error::Negotiation(format!("failed to commit remote answer: {}", e)))?;

        session.pending.drain_into(&transport).await;

        Ok(())
    }

    /// One-shot media session creation
    async fn ensure_transport(&self, session: &mut CallSession) -> Result<Arc<dyn MediaSession>> {
        if let Some(transport) = &session.transport {
            return Ok(transport.clone());
        }

        let (tx, mut rx) = mpsc::channel(TRANSPORT_EVENT_DEPTH);
        let transport = self.media.create_session(&self.ice_servers, tx).await?;
        session.transport = Some(transport.clone());

        // Pump transport callbacks into the call machine's event queue.
        // The pump ends when the session drops its sender.
        let events = self.events.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if events.send(CallEvent::Transport(event)).await.is_err() {
                    break;
                }
            }
        });

        Ok(transport)
    }

    /// One-shot capture and track attachment
    async fn ensure_local_media(
        &self,
        session: &mut CallSession,
        transport: &Arc<dyn MediaSession>,
    ) -> Result<()> {
        if session.local_tracks.is_none() {
            let tracks = self.capture.acquire_audio().await?;
            debug!(session = %session.id, count = tracks.len(), "acquired local audio");
            session.local_tracks = Some(tracks);
        }

        if !session.tracks_attached && transport.sender_count().await == 0 {
            if let Some(tracks) = &session.local_tracks {
                transport.attach_local_tracks(tracks).await?;
            }
        }
        session.tracks_attached = true;

        Ok(())
    }
}
