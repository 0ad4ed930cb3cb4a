//! webrtc-rs backed media engine
//!
//! Production implementation of the media capability seams over
//! `webrtc::RTCPeerConnection`. One [`WebRtcSession`] wraps one peer
//! connection; its callbacks are forwarded into the call machine as
//! [`TransportEvent`]s.

use crate::config::IceServerConfig;
use crate::media::{
    AudioCapture, AudioTrackHandle, IceCandidate, LocalTracks, MediaEngine, MediaSession,
    SessionDescription, TransportEvent, TransportState,
};
use crate::media::DescriptionKind;
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine as RtcMediaEngine, MIME_TYPE_OPUS};
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::media::Sample;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// Media engine backed by webrtc-rs
#[derive(Debug, Default)]
pub struct WebRtcEngine;

impl WebRtcEngine {
    /// Create the engine
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaEngine for WebRtcEngine {
    async fn create_session(
        &self,
        ice_servers: &[IceServerConfig],
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Arc<dyn MediaSession>> {
        // Media engine with default codecs (Opus for audio)
        let mut media_engine = RtcMediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| Error::WebRtc(format!("Failed to register codecs: {}", e)))?;

        let interceptor_registry =
            register_default_interceptors(Default::default(), &mut media_engine)
                .map_err(|e| Error::WebRtc(format!("Failed to register interceptors: {}", e)))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(interceptor_registry)
            .build();

        let rtc_ice_servers: Vec<RTCIceServer> = ice_servers
            .iter()
            .map(|server| RTCIceServer {
                urls: server.urls.clone(),
                username: server.username.clone().unwrap_or_default(),
                credential: server.credential.clone().unwrap_or_default(),
                ..Default::default()
            })
            .collect();

        let config = RTCConfiguration {
            ice_servers: rtc_ice_servers,
            ..Default::default()
        };

        let pc = Arc::new(
            api.new_peer_connection(config)
                .await
                .map_err(|e| Error::WebRtc(format!("Failed to create peer connection: {}", e)))?,
        );

        // Gathered candidates go to the peer via the call machine
        let tx = events.clone();
        pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let tx = tx.clone();
            Box::pin(async move {
                if let Some(candidate) = candidate {
                    match candidate.to_json() {
                        Ok(init) => {
                            let _ = tx
                                .send(TransportEvent::LocalCandidate(IceCandidate {
                                    candidate: init.candidate,
                                    sdp_mid: init.sdp_mid,
                                    sdp_mline_index: init.sdp_mline_index,
                                }))
                                .await;
                        }
                        Err(e) => warn!("failed to serialize local candidate: {}", e),
                    }
                }
            })
        }));

        let tx = events.clone();
        pc.on_track(Box::new(move |track: Arc<TrackRemote>, _receiver, _transceiver| {
            let tx = tx.clone();
            Box::pin(async move {
                debug!(
                    kind = %track.kind(),
                    codec = %track.codec().capability.mime_type,
                    "remote track arrived"
                );
                let handle: Arc<dyn AudioTrackHandle> = Arc::new(WebRtcRemoteTrack::new(track));
                let _ = tx.send(TransportEvent::RemoteTrack(handle)).await;
            })
        }));

        let tx = events;
        pc.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
            let tx = tx.clone();
            Box::pin(async move {
                let state = match s {
                    RTCPeerConnectionState::New => TransportState::New,
                    RTCPeerConnectionState::Connecting => TransportState::Connecting,
                    RTCPeerConnectionState::Connected => TransportState::Connected,
                    RTCPeerConnectionState::Disconnected => TransportState::Disconnected,
                    RTCPeerConnectionState::Failed => TransportState::Failed,
                    RTCPeerConnectionState::Closed => TransportState::Closed,
                    _ => return,
                };
                let _ = tx.send(TransportEvent::StateChanged(state)).await;
            })
        }));

        Ok(Arc::new(WebRtcSession { pc }))
    }
}

/// One peer connection, driven through the [`MediaSession`] seam
pub struct WebRtcSession {
    pc: Arc<RTCPeerConnection>,
}

fn to_rtc_description(desc: SessionDescription) -> Result<RTCSessionDescription> {
    let result = match desc.kind {
        DescriptionKind::Offer => RTCSessionDescription::offer(desc.sdp),
        DescriptionKind::Answer => RTCSessionDescription::answer(desc.sdp),
    };
    result.map_err(|e| Error::WebRtc(format!("Failed to parse description: {}", e)))
}

#[async_trait]
impl MediaSession for WebRtcSession {
    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| Error::WebRtc(format!("Failed to create offer: {}", e)))?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(|e| Error::WebRtc(format!("Failed to create answer: {}", e)))?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        self.pc
            .set_local_description(to_rtc_description(desc)?)
            .await
            .map_err(|e| Error::WebRtc(format!("Failed to set local description: {}", e)))
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        self.pc
            .set_remote_description(to_rtc_description(desc)?)
            .await
            .map_err(|e| Error::WebRtc(format!("Failed to set remote description: {}", e)))
    }

    async fn has_remote_description(&self) -> bool {
        self.pc.remote_description().await.is_some()
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_mline_index,
            username_fragment: None,
        };
        self.pc
            .add_ice_candidate(init)
            .await
            .map_err(|e| Error::CandidateApply(format!("Failed to add candidate: {}", e)))
    }

    async fn attach_local_tracks(&self, tracks: &[Arc<dyn AudioTrackHandle>]) -> Result<usize> {
        if !self.pc.get_senders().await.is_empty() {
            return Ok(0);
        }

        let mut attached = 0;
        for track in tracks {
            let local = track
                .as_any()
                .downcast_ref::<WebRtcAudioTrack>()
                .ok_or_else(|| {
                    Error::Transport("track was not produced by the webrtc engine".to_string())
                })?;
            self.pc
                .add_track(local.rtc_track() as Arc<dyn TrackLocal + Send + Sync>)
                .await
                .map_err(|e| Error::WebRtc(format!("Failed to add track: {}", e)))?;
            attached += 1;
        }
        Ok(attached)
    }

    async fn sender_count(&self) -> usize {
        self.pc.get_senders().await.len()
    }

    async fn close(&self) -> Result<()> {
        self.pc
            .close()
            .await
            .map_err(|e| Error::WebRtc(format!("Failed to close peer connection: {}", e)))
    }
}

/// Local Opus audio track
///
/// The owner pumps encoded frames in through [`write_frame`]
/// (`WebRtcAudioTrack::write_frame`); frames are discarded while the
/// track is muted or stopped.
pub struct WebRtcAudioTrack {
    id: String,
    track: Arc<TrackLocalStaticSample>,
    enabled: AtomicBool,
    stopped: AtomicBool,
}

impl WebRtcAudioTrack {
    fn new(track: Arc<TrackLocalStaticSample>) -> Self {
        Self {
            id: track.id().to_string(),
            track,
            enabled: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
        }
    }

    pub(crate) fn rtc_track(&self) -> Arc<TrackLocalStaticSample> {
        self.track.clone()
    }

    /// Write one encoded Opus frame
    pub async fn write_frame(&self, data: Bytes, duration: Duration) -> Result<()> {
        if self.stopped.load(Ordering::SeqCst) || !self.enabled.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.track
            .write_sample(&Sample {
                data,
                duration,
                ..Default::default()
            })
            .await
            .map_err(|e| Error::Transport(format!("Failed to write sample: {}", e)))
    }
}

impl fmt::Debug for WebRtcAudioTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebRtcAudioTrack")
            .field("id", &self.id)
            .field("enabled", &self.enabled.load(Ordering::SeqCst))
            .finish()
    }
}

impl AudioTrackHandle for WebRtcAudioTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Remote audio track handle
///
/// The underlying track is owned by the transport; readers consult
/// `is_enabled` and stop draining once the handle is stopped.
pub struct WebRtcRemoteTrack {
    id: String,
    track: Arc<TrackRemote>,
    enabled: AtomicBool,
    stopped: AtomicBool,
}

impl WebRtcRemoteTrack {
    fn new(track: Arc<TrackRemote>) -> Self {
        Self {
            id: track.id(),
            track,
            enabled: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
        }
    }

    /// The underlying remote track, for RTP readers
    pub fn rtc_track(&self) -> Arc<TrackRemote> {
        self.track.clone()
    }

    /// Whether the handle has been stopped
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for WebRtcRemoteTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebRtcRemoteTrack")
            .field("id", &self.id)
            .field("enabled", &self.enabled.load(Ordering::SeqCst))
            .finish()
    }
}

impl AudioTrackHandle for WebRtcRemoteTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Capture that yields a locally produced Opus track
///
/// There is no microphone here: the returned track is a sink the
/// application writes encoded frames into, which is how local audio
/// enters a webrtc-rs pipeline.
#[derive(Debug, Clone)]
pub struct WebRtcCapture {
    /// Sampling rate in Hz (default: 48000)
    pub sample_rate: u32,
    /// Number of channels (default: 1)
    pub channels: u16,
}

impl Default for WebRtcCapture {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 1,
        }
    }
}

#[async_trait]
impl AudioCapture for WebRtcCapture {
    async fn acquire_audio(&self) -> Result<LocalTracks> {
        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_string(),
                clock_rate: self.sample_rate,
                channels: self.channels,
                sdp_fmtp_line: String::new(),
                rtcp_feedback: vec![],
            },
            format!("audio-{}", uuid::Uuid::new_v4()),
            "peercall".to_string(),
        ));

        Ok(vec![Arc::new(WebRtcAudioTrack::new(track))])
    }
}
