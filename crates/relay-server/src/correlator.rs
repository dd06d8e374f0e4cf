//! Request/response correlation over a single ordered connection.
//!
//! The correlator matches every outbound request that expects a reply to
//! exactly one inbound response, keyed by correlation id, without ever
//! blocking the connection's read loop. Many requests from many sessions can
//! be pending at once; resolving one never touches the others.
//!
//! Deadlines are enforced by a single sweeper task per correlator — there is
//! no timer per request. A request that times out resolves to
//! [`CorrelationError::Timeout`]; for confirmation round trips the caller
//! treats that as a denial, never an approval.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use relay_core::frames::Frame;
use relay_core::ids::ConnectionId;

/// How often the sweeper scans for expired entries.
const SWEEP_INTERVAL: Duration = Duration::from_millis(50);

/// Failure modes for a pending request.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CorrelationError {
    /// No response arrived before the deadline.
    #[error("No response before the deadline")]
    Timeout,

    /// The connection closed while the request was pending.
    #[error("Connection lost while the request was pending")]
    ConnectionLost,

    /// A request with this correlation id is already pending. The existing
    /// entry is kept; the new request is rejected.
    #[error("Correlation id already pending: {0}")]
    DuplicateId(String),

    /// The caller cancelled the request (session closed mid-flight).
    #[error("Request cancelled")]
    Cancelled,

    /// The outbound queue is closed; the frame was never sent.
    #[error("Outbound queue closed")]
    QueueClosed,
}

/// Who initiated the pending request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestKind {
    /// Sent by the remote peer, awaited by it.
    ClientInitiated,
    /// Sent by this end (e.g. a confirmation round trip).
    ServerInitiated,
}

struct PendingRequest {
    #[allow(dead_code)]
    kind: RequestKind,
    #[allow(dead_code)]
    created_at: Instant,
    deadline: Instant,
    tx: oneshot::Sender<Result<Value, CorrelationError>>,
}

struct Inner {
    connection_id: ConnectionId,
    outbound: mpsc::Sender<Frame>,
    pending: Mutex<HashMap<String, PendingRequest>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl Inner {
    /// Resolve every entry whose deadline has passed.
    fn sweep_expired(&self) {
        let now = Instant::now();
        let expired: Vec<(String, PendingRequest)> = {
            let mut pending = self.pending.lock();
            let ids: Vec<String> = pending
                .iter()
                .filter(|(_, entry)| entry.deadline <= now)
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| pending.remove(&id).map(|entry| (id, entry)))
                .collect()
        };
        for (id, entry) in expired {
            warn!(connection_id = %self.connection_id, id, "correlation timed out");
            metrics::counter!("correlation_timeouts_total").increment(1);
            let _ = entry.tx.send(Err(CorrelationError::Timeout));
        }
    }
}

/// Per-connection request/response correlator.
///
/// Owned by its [`crate::connection::Connection`]; dropped (and thereby
/// swept clean) with it.
pub struct Correlator {
    inner: Arc<Inner>,
}

impl Correlator {
    /// Create a correlator writing to the connection's ordered outbound
    /// queue. Spawns the deadline sweeper; the task exits when the
    /// correlator is closed or dropped.
    pub fn new(connection_id: ConnectionId, outbound: mpsc::Sender<Frame>) -> Self {
        let inner = Arc::new(Inner {
            connection_id,
            outbound,
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        });

        let weak = Arc::downgrade(&inner);
        let _sweeper = tokio::spawn(async move {
            let mut tick = tokio::time::interval(SWEEP_INTERVAL);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                let _ = tick.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                if inner.closed.load(Ordering::Relaxed) {
                    break;
                }
                inner.sweep_expired();
            }
        });

        Self { inner }
    }

    /// The owning connection's id.
    pub fn connection_id(&self) -> &ConnectionId {
        &self.inner.connection_id
    }

    /// Send a server-initiated request with a generated correlation id and
    /// await the matching response.
    pub async fn send_request(
        &self,
        op: &str,
        payload: Value,
        timeout: Duration,
    ) -> Result<Value, CorrelationError> {
        self.send_request_inner(None, op, payload, timeout, None)
            .await
    }

    /// Send a server-initiated request with a caller-chosen correlation id.
    ///
    /// Rejected with [`CorrelationError::DuplicateId`] if that id is already
    /// pending on this connection; the existing entry is untouched.
    pub async fn send_request_with_id(
        &self,
        id: &str,
        op: &str,
        payload: Value,
        timeout: Duration,
    ) -> Result<Value, CorrelationError> {
        self.send_request_inner(Some(id), op, payload, timeout, None)
            .await
    }

    /// Send a server-initiated request racing `cancel`: if the token fires
    /// before a response arrives, the pending entry is removed and the call
    /// resolves to [`CorrelationError::Cancelled`].
    pub async fn send_request_cancellable(
        &self,
        op: &str,
        payload: Value,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Value, CorrelationError> {
        self.send_request_inner(None, op, payload, timeout, Some(cancel))
            .await
    }

    async fn send_request_inner(
        &self,
        explicit_id: Option<&str>,
        op: &str,
        payload: Value,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
    ) -> Result<Value, CorrelationError> {
        if self.inner.closed.load(Ordering::Relaxed) {
            return Err(CorrelationError::ConnectionLost);
        }

        let (tx, rx) = oneshot::channel();
        let id = {
            let mut pending = self.inner.pending.lock();
            let id = match explicit_id {
                Some(id) => {
                    if pending.contains_key(id) {
                        warn!(
                            connection_id = %self.inner.connection_id,
                            id,
                            "duplicate correlation id rejected"
                        );
                        return Err(CorrelationError::DuplicateId(id.to_owned()));
                    }
                    id.to_owned()
                }
                None => self.allocate_id(&pending),
            };
            let now = Instant::now();
            let _ = pending.insert(
                id.clone(),
                PendingRequest {
                    kind: RequestKind::ServerInitiated,
                    created_at: now,
                    deadline: now + timeout,
                    tx,
                },
            );
            id
        };

        // Exactly one frame onto the ordered outbound queue.
        let frame = Frame::server_request(&id, op, Some(payload));
        if self.inner.outbound.send(frame).await.is_err() {
            let _ = self.take(&id);
            return Err(CorrelationError::QueueClosed);
        }
        debug!(connection_id = %self.inner.connection_id, id, op, "server request sent");

        let received = match cancel {
            None => rx.await,
            Some(token) => tokio::select! {
                received = rx => received,
                () = token.cancelled() => {
                    if self.take(&id).is_some() {
                        debug!(connection_id = %self.inner.connection_id, id, "pending request cancelled");
                    }
                    return Err(CorrelationError::Cancelled);
                }
            },
        };

        // The sender is dropped without a value only if the correlator
        // disappeared out from under us.
        received.unwrap_or(Err(CorrelationError::ConnectionLost))
    }

    /// Generate a correlation id unique among the currently pending ids.
    fn allocate_id(&self, pending: &HashMap<String, PendingRequest>) -> String {
        loop {
            let n = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
            let id = format!("srv-{n}");
            if !pending.contains_key(&id) {
                return id;
            }
        }
    }

    /// Resolve a pending request with an inbound response payload.
    ///
    /// A response for an unknown, already-resolved, or timed-out id is
    /// dropped and logged as a protocol anomaly — it never errors into the
    /// read loop. Resolution is exactly-once.
    pub fn resolve_response(&self, id: &str, payload: Value) {
        match self.take(id) {
            Some(entry) => {
                debug!(connection_id = %self.inner.connection_id, id, "response correlated");
                let _ = entry.tx.send(Ok(payload));
            }
            None => {
                warn!(
                    connection_id = %self.inner.connection_id,
                    id,
                    "response for unknown correlation id dropped"
                );
                metrics::counter!("protocol_anomalies_total").increment(1);
            }
        }
    }

    /// Fail a pending request. A second resolution for the same id is a
    /// logged no-op.
    pub fn fail(&self, id: &str, error: CorrelationError) {
        match self.take(id) {
            Some(entry) => {
                let _ = entry.tx.send(Err(error));
            }
            None => debug!(id, "late failure for already-resolved correlation id"),
        }
    }

    /// Close the correlator: every pending request resolves to
    /// [`CorrelationError::ConnectionLost`] in one sweep, and no new
    /// requests are accepted.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Relaxed);
        let drained: Vec<(String, PendingRequest)> =
            self.inner.pending.lock().drain().collect();
        let count = drained.len();
        for (id, entry) in drained {
            debug!(connection_id = %self.inner.connection_id, id, "pending request aborted: connection lost");
            let _ = entry.tx.send(Err(CorrelationError::ConnectionLost));
        }
        if count > 0 {
            warn!(connection_id = %self.inner.connection_id, count, "aborted pending requests on close");
        }
    }

    /// Number of requests currently pending.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    fn take(&self, id: &str) -> Option<PendingRequest> {
        self.inner.pending.lock().remove(id)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
