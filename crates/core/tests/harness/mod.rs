//! Shared test doubles for driving the call machine without a live
//! signaling server or media transport

#![allow(dead_code)]

use async_trait::async_trait;
use peercall_core::{
    AudioCapture, AudioMonitor, AudioTrackHandle, CallConfig, CallEvent, CallHandle, CallMachine,
    CallObserver, CallSnapshot, CallState, Error, IceCandidate, IceServerConfig, MediaEngine,
    MediaSession, Result, SessionDescription, SignalingChannel, SignalingMessage, TransportEvent,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Shared operation log for cross-double ordering assertions
pub type OpLog = Arc<Mutex<Vec<String>>>;

// ===== media doubles =====

#[derive(Debug)]
pub struct MockTrack {
    enabled: AtomicBool,
    pub stops: AtomicUsize,
}

impl MockTrack {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            stops: AtomicUsize::new(0),
        }
    }
}

impl AudioTrackHandle for MockTrack {
    fn id(&self) -> &str {
        "mock-track"
    }
    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

pub struct MockSession {
    ops: OpLog,
    pub local_set: AtomicBool,
    pub remote_set: AtomicBool,
    pub applied: Mutex<Vec<String>>,
    pub senders: AtomicUsize,
    pub closes: AtomicUsize,
    pub fail_set_remote: AtomicBool,
}

impl MockSession {
    fn new(ops: OpLog) -> Self {
        Self {
            ops,
            local_set: AtomicBool::new(false),
            remote_set: AtomicBool::new(false),
            applied: Mutex::new(Vec::new()),
            senders: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            fail_set_remote: AtomicBool::new(false),
        }
    }

    fn log(&self, op: &str) {
        self.ops.lock().unwrap().push(op.to_string());
    }
}

#[async_trait]
impl MediaSession for MockSession {
    async fn create_offer(&self) -> Result<SessionDescription> {
        self.log("create_offer");
        Ok(SessionDescription::offer("mock-offer-sdp".to_string()))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        self.log("create_answer");
        Ok(SessionDescription::answer("mock-answer-sdp".to_string()))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        self.log(&format!("set_local:{:?}", desc.kind));
        self.local_set.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        if self.fail_set_remote.load(Ordering::SeqCst) {
            return Err(Error::Transport("remote description rejected".to_string()));
        }
        self.log(&format!("set_remote:{:?}", desc.kind));
        self.remote_set.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn has_remote_description(&self) -> bool {
        self.remote_set.load(Ordering::SeqCst)
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.log(&format!("apply:{}", candidate.candidate));
        self.applied.lock().unwrap().push(candidate.candidate);
        Ok(())
    }

    async fn attach_local_tracks(&self, tracks: &[Arc<dyn AudioTrackHandle>]) -> Result<usize> {
        if self.senders.load(Ordering::SeqCst) > 0 {
            return Ok(0);
        }
        self.log("attach");
        self.senders.store(tracks.len(), Ordering::SeqCst);
        Ok(tracks.len())
    }

    async fn sender_count(&self) -> usize {
        self.senders.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<()> {
        self.log("close");
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MockEngine {
    ops: OpLog,
    pub sessions: Mutex<Vec<Arc<MockSession>>>,
    pub fail_create: AtomicBool,
}

impl MockEngine {
    pub fn new(ops: OpLog) -> Self {
        Self {
            ops,
            sessions: Mutex::new(Vec::new()),
            fail_create: AtomicBool::new(false),
        }
    }

    /// The most recently created session
    pub fn last_session(&self) -> Arc<MockSession> {
        self.sessions
            .lock()
            .unwrap()
            .last()
            .expect("no media session was created")
            .clone()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

#[async_trait]
impl MediaEngine for MockEngine {
    async fn create_session(
        &self,
        _ice_servers: &[IceServerConfig],
        _events: mpsc::Sender<TransportEvent>,
    ) -> Result<Arc<dyn MediaSession>> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Error::Transport("engine unavailable".to_string()));
        }
        self.ops.lock().unwrap().push("create_session".to_string());
        let session = Arc::new(MockSession::new(self.ops.clone()));
        self.sessions.lock().unwrap().push(session.clone());
        Ok(session)
    }
}

pub struct MockCapture {
    pub deny: AtomicBool,
    pub tracks: Mutex<Vec<Arc<MockTrack>>>,
}

impl MockCapture {
    pub fn new() -> Self {
        Self {
            deny: AtomicBool::new(false),
            tracks: Mutex::new(Vec::new()),
        }
    }

    pub fn last_track(&self) -> Arc<MockTrack> {
        self.tracks
            .lock()
            .unwrap()
            .last()
            .expect("no track was captured")
            .clone()
    }
}

#[async_trait]
impl AudioCapture for MockCapture {
    async fn acquire_audio(&self) -> Result<Vec<Arc<dyn AudioTrackHandle>>> {
        if self.deny.load(Ordering::SeqCst) {
            return Err(Error::Permission("microphone access denied".to_string()));
        }
        let track = Arc::new(MockTrack::new());
        self.tracks.lock().unwrap().push(track.clone());
        Ok(vec![track])
    }
}

// ===== signaling doubles =====

pub struct MockChannel {
    pub open: AtomicBool,
    pub sent: Mutex<Vec<SignalingMessage>>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self {
            open: AtomicBool::new(true),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent_actions(&self) -> Vec<&'static str> {
        self.sent.lock().unwrap().iter().map(|m| m.action()).collect()
    }

    pub fn sent_messages(&self) -> Vec<SignalingMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SignalingChannel for MockChannel {
    async fn send(&self, text: String) -> Result<()> {
        if !self.is_open() {
            return Err(Error::ChannelUnavailable);
        }
        let message = SignalingMessage::decode(&text)?
            .ok_or_else(|| Error::Serialization("unknown action in test".to_string()))?;
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

// ===== observer doubles =====

struct MockMonitor {
    shutdowns: Arc<AtomicUsize>,
    volume: Arc<Mutex<f32>>,
}

impl AudioMonitor for MockMonitor {
    fn set_volume(&mut self, volume: f32) {
        *self.volume.lock().unwrap() = volume;
    }
    fn shutdown(&mut self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct RecordingObserver {
    pub snapshots: Mutex<Vec<CallSnapshot>>,
    pub incoming: Mutex<Vec<(String, String)>>,
    pub errors: Mutex<Vec<String>>,
    pub remote_tracks: AtomicUsize,
    pub monitor_shutdowns: Arc<AtomicUsize>,
    pub monitor_volume: Arc<Mutex<f32>>,
    transitions: mpsc::UnboundedSender<CallSnapshot>,
}

impl RecordingObserver {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<CallSnapshot>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let observer = Arc::new(Self {
            snapshots: Mutex::new(Vec::new()),
            incoming: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
            remote_tracks: AtomicUsize::new(0),
            monitor_shutdowns: Arc::new(AtomicUsize::new(0)),
            monitor_volume: Arc::new(Mutex::new(1.0)),
            transitions: tx,
        });
        (observer, rx)
    }

    pub fn states(&self) -> Vec<peercall_core::CallState> {
        self.snapshots.lock().unwrap().iter().map(|s| s.state).collect()
    }
}

#[async_trait]
impl CallObserver for RecordingObserver {
    async fn on_state_changed(&self, snapshot: CallSnapshot) {
        self.snapshots.lock().unwrap().push(snapshot.clone());
        let _ = self.transitions.send(snapshot);
    }

    async fn on_incoming_call(&self, caller_id: &str, caller_name: &str) {
        self.incoming
            .lock()
            .unwrap()
            .push((caller_id.to_string(), caller_name.to_string()));
    }

    async fn on_remote_track(
        &self,
        _track: Arc<dyn AudioTrackHandle>,
    ) -> Option<Box<dyn AudioMonitor>> {
        self.remote_tracks.fetch_add(1, Ordering::SeqCst);
        Some(Box::new(MockMonitor {
            shutdowns: self.monitor_shutdowns.clone(),
            volume: self.monitor_volume.clone(),
        }))
    }

    async fn on_error(&self, error: &Error) {
        self.errors.lock().unwrap().push(error.to_string());
    }
}

// ===== assembled endpoint =====

pub struct TestEndpoint {
    pub machine: CallMachine,
    pub handle: CallHandle,
    pub ops: OpLog,
    pub engine: Arc<MockEngine>,
    pub capture: Arc<MockCapture>,
    pub channel: Arc<MockChannel>,
    pub observer: Arc<RecordingObserver>,
    pub transitions: mpsc::UnboundedReceiver<CallSnapshot>,
}

/// A machine wired to mocks, for direct-drive tests
pub fn endpoint(local_party: &str) -> TestEndpoint {
    let ops: OpLog = Arc::new(Mutex::new(Vec::new()));
    let engine = Arc::new(MockEngine::new(ops.clone()));
    let capture = Arc::new(MockCapture::new());
    let channel = Arc::new(MockChannel::new());
    let (observer, transitions) = RecordingObserver::new();

    let config = CallConfig::default()
        .with_local_party(local_party)
        .with_ended_linger_ms(200);

    let (machine, handle) = CallMachine::new(
        config,
        engine.clone(),
        capture.clone(),
        channel.clone(),
        observer.clone(),
    )
    .expect("valid test config");

    TestEndpoint {
        machine,
        handle,
        ops,
        engine,
        capture,
        channel,
        observer,
        transitions,
    }
}

// ===== in-memory signaling server =====

/// Channel half that hands outbound messages to the router
pub struct RouterChannel {
    party: String,
    to_router: mpsc::UnboundedSender<(String, SignalingMessage)>,
    open: AtomicBool,
}

#[async_trait]
impl SignalingChannel for RouterChannel {
    async fn send(&self, text: String) -> Result<()> {
        if !self.is_open() {
            return Err(Error::ChannelUnavailable);
        }
        let message = SignalingMessage::decode(&text)?
            .ok_or_else(|| Error::Serialization("unknown action in test".to_string()))?;
        self.to_router
            .send((self.party.clone(), message))
            .map_err(|_| Error::ChannelUnavailable)
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// An in-memory stand-in for the signaling server between two parties
///
/// Performs the server-side action translation: `call` arrives as
/// `incoming_call`, `accept` as `call_accepted`, `reject` as
/// `call_rejected`; negotiation messages pass through unchanged.
pub fn spawn_router(
    party_a: (&str, mpsc::Sender<CallEvent>),
    party_b: (&str, mpsc::Sender<CallEvent>),
) -> (Arc<RouterChannel>, Arc<RouterChannel>) {
    let (to_router, mut from_parties) = mpsc::unbounded_channel::<(String, SignalingMessage)>();

    let channel_a = Arc::new(RouterChannel {
        party: party_a.0.to_string(),
        to_router: to_router.clone(),
        open: AtomicBool::new(true),
    });
    let channel_b = Arc::new(RouterChannel {
        party: party_b.0.to_string(),
        to_router,
        open: AtomicBool::new(true),
    });

    let name_a = party_a.0.to_string();
    let events_a = party_a.1;
    let events_b = party_b.1;

    tokio::spawn(async move {
        while let Some((from, message)) = from_parties.recv().await {
            let dest = if from == name_a { &events_b } else { &events_a };
            let translated = match message {
                SignalingMessage::Call { .. } => SignalingMessage::IncomingCall {
                    caller_id: from.clone(),
                    caller_name: from.clone(),
                },
                SignalingMessage::Accept { .. } => SignalingMessage::CallAccepted,
                SignalingMessage::Reject { .. } => SignalingMessage::CallRejected,
                passthrough => passthrough,
            };
            if dest.send(CallEvent::Message(translated)).await.is_err() {
                break;
            }
        }
    });

    (channel_a, channel_b)
}

// ===== running endpoints =====

/// An endpoint whose machine runs on its own task, reachable only
/// through its handle and observer
pub struct LiveEndpoint {
    pub handle: CallHandle,
    pub ops: OpLog,
    pub engine: Arc<MockEngine>,
    pub capture: Arc<MockCapture>,
    pub observer: Arc<RecordingObserver>,
    pub transitions: mpsc::UnboundedReceiver<CallSnapshot>,
}

/// Two running machines wired through the in-memory router
pub fn paired(party_a: &str, party_b: &str) -> (LiveEndpoint, LiveEndpoint) {
    let (proxy_a_tx, proxy_a_rx) = mpsc::channel(64);
    let (proxy_b_tx, proxy_b_rx) = mpsc::channel(64);
    let (channel_a, channel_b) = spawn_router((party_a, proxy_a_tx), (party_b, proxy_b_tx));

    (
        live_endpoint(party_a, channel_a, proxy_a_rx),
        live_endpoint(party_b, channel_b, proxy_b_rx),
    )
}

fn live_endpoint(
    party: &str,
    channel: Arc<RouterChannel>,
    mut inbound: mpsc::Receiver<CallEvent>,
) -> LiveEndpoint {
    let ops: OpLog = Arc::new(Mutex::new(Vec::new()));
    let engine = Arc::new(MockEngine::new(ops.clone()));
    let capture = Arc::new(MockCapture::new());
    let (observer, transitions) = RecordingObserver::new();

    let config = CallConfig::default()
        .with_local_party(party)
        .with_ended_linger_ms(200);

    let (machine, handle) = CallMachine::new(
        config,
        engine.clone(),
        capture.clone(),
        channel,
        observer.clone(),
    )
    .expect("valid test config");

    // The router cannot know the machine's event sender before the
    // machine exists, so inbound messages go through a proxy queue.
    let events = handle.sender();
    tokio::spawn(async move {
        while let Some(event) = inbound.recv().await {
            if events.send(event).await.is_err() {
                break;
            }
        }
    });
    tokio::spawn(machine.run());

    LiveEndpoint {
        handle,
        ops,
        engine,
        capture,
        observer,
        transitions,
    }
}

/// Consume transitions until the wanted state is reached
pub async fn wait_for_state(
    transitions: &mut mpsc::UnboundedReceiver<CallSnapshot>,
    want: CallState,
) -> CallSnapshot {
    loop {
        let snapshot = tokio::time::timeout(Duration::from_secs(2), transitions.recv())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {:?}", want))
            .expect("call machine stopped before reaching the wanted state");
        if snapshot.state == want {
            return snapshot;
        }
    }
}

/// Poll until the condition holds
pub async fn wait_until<F: Fn() -> bool>(what: &str, cond: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting until {}",
            what
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
