//! Outbound side of the signaling channel adapter

use super::protocol::SignalingMessage;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// An ordered, reliable, bidirectional message pipe
///
/// The pipe is connected before call setup begins; this crate never
/// dials or re-dials it.
#[async_trait]
pub trait SignalingChannel: Send + Sync {
    /// Send one serialized message
    ///
    /// # Errors
    ///
    /// Fails with [`Error::ChannelUnavailable`] when the pipe is closed.
    async fn send(&self, text: String) -> Result<()>;

    /// Whether the pipe is currently open
    fn is_open(&self) -> bool;
}

/// Best-effort outbound sender
///
/// Signaling is not retried: a message that cannot be sent because the
/// pipe is closed is dropped and logged, never queued.
#[derive(Clone)]
pub struct Signaler {
    channel: Arc<dyn SignalingChannel>,
}

impl Signaler {
    /// Wrap a connected channel
    pub fn new(channel: Arc<dyn SignalingChannel>) -> Self {
        Self { channel }
    }

    /// Serialize and send a message, dropping it if the pipe is closed
    pub async fn send(&self, message: &SignalingMessage) {
        if !self.channel.is_open() {
            debug!(
                action = message.action(),
                "signaling pipe closed, dropping outbound message"
            );
            return;
        }

        let text = match message.encode() {
            Ok(text) => text,
            Err(e) => {
                warn!(action = message.action(), "failed to encode message: {}", e);
                return;
            }
        };

        match self.channel.send(text).await {
            Ok(()) => {}
            Err(Error::ChannelUnavailable) => {
                debug!(
                    action = message.action(),
                    "signaling pipe closed mid-send, message dropped"
                );
            }
            Err(e) => {
                warn!(action = message.action(), "outbound send failed: {}", e);
            }
        }
    }
}
