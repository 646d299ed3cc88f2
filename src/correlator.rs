//! Pending-request correlator - matches response frames to waiting callers

use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{SessionError, SessionResult};

/// Waiting side of a pending request
pub type PendingResponse = oneshot::Receiver<String>;

struct PendingRequest {
    tx: oneshot::Sender<String>,
    issued_at: Instant,
}

/// Outstanding requests: request id -> waiter
///
/// Entries are removed exactly once, by [`resolve`](Self::resolve) or
/// [`remove`](Self::remove). There is no internal expiry; callers bound their
/// own wait through [`wait`](Self::wait).
#[derive(Default)]
pub struct PendingRequests {
    pending: DashMap<String, PendingRequest>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for `id`
    pub fn issue(&self, id: &str) -> SessionResult<PendingResponse> {
        match self.pending.entry(id.to_string()) {
            Entry::Occupied(_) => Err(SessionError::DuplicateRequest(id.to_string())),
            Entry::Vacant(slot) => {
                let (tx, rx) = oneshot::channel();
                slot.insert(PendingRequest {
                    tx,
                    issued_at: Instant::now(),
                });
                Ok(rx)
            }
        }
    }

    /// Deliver `data` to the waiter for `id`. Returns `false` when nothing was
    /// pending, which is expected for late responses.
    pub fn resolve(&self, id: &str, data: String) -> bool {
        let Some((_, pending)) = self.pending.remove(id) else {
            debug!("No pending request for {}, dropping response", id);
            return false;
        };

        debug!(
            "Resolved request {} after {:?}",
            id,
            pending.issued_at.elapsed()
        );
        if pending.tx.send(data).is_err() {
            warn!("Waiter for request {} went away before resolution", id);
        }
        true
    }

    /// Drop the entry for `id` without delivering anything
    pub fn remove(&self, id: &str) -> bool {
        self.pending.remove(id).is_some()
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Age of the longest-waiting request
    pub fn oldest_age(&self) -> Option<Duration> {
        self.pending
            .iter()
            .map(|entry| entry.issued_at.elapsed())
            .max()
    }

    /// Await `rx` for at most `limit`, removing the entry on local timeout
    pub async fn wait(
        &self,
        id: &str,
        rx: PendingResponse,
        limit: Duration,
    ) -> SessionResult<String> {
        match tokio::time::timeout(limit, rx).await {
            Ok(Ok(data)) => Ok(data),
            Ok(Err(_)) => {
                self.remove(id);
                Err(SessionError::Canceled(id.to_string()))
            }
            Err(_) => {
                self.remove(id);
                warn!("Timeout waiting for response to {}", id);
                Err(SessionError::Timeout {
                    id: id.to_string(),
                    elapsed: limit,
                })
            }
        }
    }
}
