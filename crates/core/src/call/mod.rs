//! Call state machine and session lifecycle

mod events;
mod machine;
mod session;
mod state;

pub use events::{AudioMonitor, CallEvent, CallObserver, CallSnapshot};
pub use machine::{CallHandle, CallMachine};
pub use session::CallSession;
pub use state::{CallRole, CallState};
