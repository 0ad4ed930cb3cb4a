//! Pending connectivity-candidate queue
//!
//! Candidates may arrive before the media session exists or before its
//! remote description is committed. They are buffered here in arrival
//! order and replayed exactly once after the commit; applying a
//! candidate too early is a protocol violation the rest of the crate
//! never performs.

use crate::media::{IceCandidate, MediaSession};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

/// FIFO buffer of not-yet-appliable candidates, scoped to one call session
#[derive(Debug, Default)]
pub struct CandidateQueue {
    pending: VecDeque<IceCandidate>,
}

impl CandidateQueue {
    /// An empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a candidate
    pub fn enqueue(&mut self, candidate: IceCandidate) {
        self.pending.push_back(candidate);
    }

    /// Number of buffered candidates
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Discard all buffered candidates
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Apply every buffered candidate to the session, in arrival order,
    /// then leave the queue empty
    ///
    /// A candidate that fails to apply is logged and skipped; failures
    /// never abort the drain or the call.
    pub async fn drain_into(&mut self, session: &Arc<dyn MediaSession>) {
        while let Some(candidate) = self.pending.pop_front() {
            if let Err(e) = session.add_ice_candidate(candidate).await {
                warn!("discarding candidate that failed to apply: {}", e);
            }
        }
    }

    /// Entry point for a freshly received candidate
    ///
    /// Applies immediately when the session exists and its remote
    /// description is set; buffers otherwise.
    pub async fn handle_incoming(
        &mut self,
        candidate: IceCandidate,
        session: Option<&Arc<dyn MediaSession>>,
    ) {
        match session {
            Some(session) if session.has_remote_description().await => {
                if let Err(e) = session.add_ice_candidate(candidate).await {
                    warn!("candidate failed to apply: {}", e);
                }
            }
            Some(_) => {
                debug!("remote description not yet set, queueing candidate");
                self.enqueue(candidate);
            }
            None => {
                debug!("no media session yet, queueing candidate");
                self.enqueue(candidate);
            }
        }
    }
}
