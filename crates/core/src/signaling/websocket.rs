//! WebSocket implementation of the signaling channel
//!
//! Connects to a signaling server over WebSocket and pumps inbound
//! messages into the call machine's event queue. The pipe is treated as
//! ordered and reliable; once it closes, outbound sends fail with
//! `ChannelUnavailable` and are dropped by the [`Signaler`](super::Signaler).

use super::protocol::SignalingMessage;
use super::signaler::SignalingChannel;
use crate::call::CallEvent;
use crate::{Error, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Depth of the outbound write queue
const WRITE_QUEUE_DEPTH: usize = 128;

/// Signaling channel over a WebSocket connection
pub struct WebSocketChannel {
    tx: mpsc::Sender<Message>,
    open: Arc<AtomicBool>,
}

impl WebSocketChannel {
    /// Connect to the signaling server and start the pump tasks
    ///
    /// Inbound protocol messages are delivered to `events` as
    /// [`CallEvent::Message`]; unrecognized actions are logged and
    /// dropped. Both pumps end when the socket closes.
    pub async fn connect(url: &str, events: mpsc::Sender<CallEvent>) -> Result<Self> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| Error::Transport(format!("Failed to connect to {}: {}", url, e)))?;
        info!(url, "signaling channel connected");

        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        let (tx, mut rx) = mpsc::channel::<Message>(WRITE_QUEUE_DEPTH);
        let open = Arc::new(AtomicBool::new(true));

        // Writer: forward queued messages to the socket
        let open_writer = Arc::clone(&open);
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = ws_tx.send(msg).await {
                    error!("failed to send on signaling channel: {}", e);
                    break;
                }
            }
            open_writer.store(false, Ordering::SeqCst);
        });

        // Reader: decode inbound messages into call events
        let open_reader = Arc::clone(&open);
        let pong_tx = tx.clone();
        tokio::spawn(async move {
            while let Some(msg) = ws_rx.next().await {
                match msg {
                    Ok(Message::Text(text)) => match SignalingMessage::decode(&text) {
                        Ok(Some(message)) => {
                            if events.send(CallEvent::Message(message)).await.is_err() {
                                break;
                            }
                        }
                        Ok(None) => warn!("ignoring unrecognized signaling action"),
                        Err(e) => warn!("dropping malformed signaling message: {}", e),
                    },
                    Ok(Message::Ping(data)) => {
                        let _ = pong_tx.send(Message::Pong(data)).await;
                    }
                    Ok(Message::Close(_)) => {
                        info!("signaling channel closed by server");
                        break;
                    }
                    Err(e) => {
                        error!("signaling channel error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
            open_reader.store(false, Ordering::SeqCst);
            debug!("signaling reader stopped");
        });

        Ok(Self { tx, open })
    }
}

#[async_trait]
impl SignalingChannel for WebSocketChannel {
    async fn send(&self, text: String) -> Result<()> {
        if !self.is_open() {
            return Err(Error::ChannelUnavailable);
        }
        self.tx
            .send(Message::Text(text))
            .await
            .map_err(|_| Error::ChannelUnavailable)
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.tx.is_closed()
    }
}
