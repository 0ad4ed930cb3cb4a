//! Signaling channel adapter
//!
//! Pure translation between wire messages and internal calls: inbound
//! messages become [`CallEvent`](crate::call::CallEvent)s, outbound
//! intents become exactly one serialized message each. No negotiation
//! logic lives here.

pub mod protocol;
mod signaler;
pub mod websocket;

pub use protocol::SignalingMessage;
pub use signaler::{Signaler, SignalingChannel};
pub use websocket::WebSocketChannel;
