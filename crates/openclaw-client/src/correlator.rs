//! Request/response correlation.
//!
//! Each outgoing request gets a fresh `req-<n>` id and a pending entry with
//! its own timeout timer. The entry is removed exactly once: by the matching
//! response, by the timer, or by connection teardown. Whoever removes it
//! completes it; every later attempt finds nothing and is a no-op.

use crate::error::ClientError;
use crate::frame::ResponseFrame;
use crate::Result;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Prefix of generated correlation ids.
pub const REQUEST_ID_PREFIX: &str = "req-";

type Completion = oneshot::Sender<Result<Value>>;

/// A sent request awaiting its outcome.
struct PendingRequest {
    method: String,
    issued_at: Instant,
    completion: Completion,
    timer: AbortHandle,
}

impl PendingRequest {
    fn complete(self, outcome: Result<Value>) {
        self.timer.abort();
        // The caller may have stopped waiting; nothing to do then.
        let _ = self.completion.send(outcome);
    }
}

/// Receiving side of one pending request.
#[derive(Debug)]
pub struct ResponseHandle {
    id: String,
    rx: oneshot::Receiver<Result<Value>>,
}

impl ResponseHandle {
    /// Correlation id of the request.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the request's single outcome.
    pub async fn wait(self) -> Result<Value> {
        match self.rx.await {
            Ok(outcome) => outcome,
            // Completion dropped without an answer: the correlator went away.
            Err(_) => Err(ClientError::ConnectionClosed),
        }
    }
}

/// Tracks outstanding requests by correlation id.
pub struct RequestCorrelator {
    next_id: AtomicU64,
    pending: Mutex<HashMap<String, PendingRequest>>,
    timeout: Duration,
}

impl RequestCorrelator {
    /// Create a correlator whose requests expire after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            next_id: AtomicU64::new(0),
            pending: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// Configured per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Allocate an id and register a pending request for `method`.
    ///
    /// Starts the request's timeout timer, so it must be called from within
    /// a Tokio runtime.
    pub fn begin(self: &Arc<Self>, method: &str) -> ResponseHandle {
        let id = format!(
            "{}{}",
            REQUEST_ID_PREFIX,
            self.next_id.fetch_add(1, Ordering::Relaxed) + 1
        );
        let (tx, rx) = oneshot::channel();

        // Hold the lock while the timer is spawned so it cannot observe a
        // missing entry.
        let mut pending = self.pending.lock();
        let timer = self.spawn_timer(id.clone());
        pending.insert(
            id.clone(),
            PendingRequest {
                method: method.to_string(),
                issued_at: Instant::now(),
                completion: tx,
                timer,
            },
        );
        drop(pending);

        debug!("Registered request {} ({})", id, method);
        ResponseHandle { id, rx }
    }

    fn spawn_timer(self: &Arc<Self>, id: String) -> AbortHandle {
        let correlator: Weak<Self> = Arc::downgrade(self);
        let timeout = self.timeout;

        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(correlator) = correlator.upgrade() {
                correlator.expire(&id);
            }
        })
        .abort_handle()
    }

    fn expire(&self, id: &str) {
        let Some(entry) = self.pending.lock().remove(id) else {
            return;
        };

        warn!("Request {} ({}) timed out", id, entry.method);
        let err = ClientError::RequestTimeout {
            method: entry.method.clone(),
            timeout_ms: self.timeout.as_millis() as u64,
        };
        // Completing from inside the timer task: abort is a no-op here.
        entry.complete(Err(err));
    }

    /// Route a response frame to its pending request.
    ///
    /// Returns `false` when no request with that id is pending (late,
    /// duplicate, or unknown response); the frame is then dropped.
    pub fn resolve(&self, frame: ResponseFrame) -> bool {
        let Some(entry) = self.pending.lock().remove(&frame.id) else {
            warn!("Received response for unknown request: {}", frame.id);
            return false;
        };

        debug!(
            "Response for {} ({}) after {:?}",
            frame.id,
            entry.method,
            entry.issued_at.elapsed()
        );
        entry.complete(frame.into_result().map_err(ClientError::Remote));
        true
    }

    /// Fail one pending request. Returns `false` if it was already resolved.
    pub fn fail(&self, id: &str, err: ClientError) -> bool {
        match self.pending.lock().remove(id) {
            Some(entry) => {
                entry.complete(Err(err));
                true
            }
            None => false,
        }
    }

    /// Fail every pending request, leaving the pending set empty.
    ///
    /// Returns how many requests were failed.
    pub fn fail_all<F>(&self, make_err: F) -> usize
    where
        F: Fn() -> ClientError,
    {
        let drained: Vec<(String, PendingRequest)> = self.pending.lock().drain().collect();
        let count = drained.len();

        for (id, entry) in drained {
            debug!("Failing pending request {} ({})", id, entry.method);
            entry.complete(Err(make_err()));
        }

        count
    }

    /// Number of requests currently pending.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Whether a request with this id is pending.
    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.lock().contains_key(id)
    }
}

impl std::fmt::Debug for RequestCorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCorrelator")
            .field("pending", &self.pending_count())
            .field("timeout", &self.timeout)
            .finish()
    }
}
