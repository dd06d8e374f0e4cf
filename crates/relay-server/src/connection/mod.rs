//! Connections — one per remote peer, each owning its correlator.

pub mod registry;

pub use registry::ConnectionRegistry;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;

use relay_core::frames::Frame;
use relay_core::ids::ConnectionId;

use crate::correlator::Correlator;

/// An open duplex channel to one remote peer.
///
/// Outbound frames go through a bounded FIFO, preserving send order per
/// connection. The connection exclusively owns its [`Correlator`].
pub struct Connection {
    id: ConnectionId,
    outbound: mpsc::Sender<Frame>,
    correlator: Correlator,
    alive: AtomicBool,
    last_pong: Mutex<Instant>,
    connected_at: Instant,
    dropped_frames: AtomicU64,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("alive", &self.alive)
            .field("connected_at", &self.connected_at)
            .field("dropped_frames", &self.dropped_frames)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Create a connection writing to `outbound`.
    pub fn new(id: ConnectionId, outbound: mpsc::Sender<Frame>) -> Self {
        let now = Instant::now();
        Self {
            correlator: Correlator::new(id.clone(), outbound.clone()),
            id,
            outbound,
            alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            connected_at: now,
            dropped_frames: AtomicU64::new(0),
        }
    }

    /// Connection id.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// The connection's correlator.
    pub fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    /// Enqueue a frame for the peer.
    ///
    /// Returns `false` (and counts the drop) if the queue is full or closed;
    /// the caller decides whether that matters.
    pub fn send(&self, frame: Frame) -> bool {
        if self.outbound.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped_frames.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Frames dropped due to a full or closed queue.
    pub fn drop_count(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    /// Whether the connection is still considered live.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    /// Mark the connection as alive (any inbound traffic or pong).
    pub fn mark_alive(&self) {
        self.alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Check and reset the alive flag for the heartbeat loop.
    ///
    /// Returns `true` if the connection saw traffic since the last check.
    pub fn check_alive(&self) -> bool {
        self.alive.swap(false, Ordering::Relaxed)
    }

    /// Duration since the last pong (or connection establishment).
    pub fn last_pong_elapsed(&self) -> std::time::Duration {
        self.last_pong.lock().elapsed()
    }

    /// Connection age.
    pub fn age(&self) -> std::time::Duration {
        self.connected_at.elapsed()
    }

    /// Mark the connection dead and abort every pending correlator entry
    /// with `ConnectionLost`. Idempotent.
    pub fn close(&self) {
        self.alive.store(false, Ordering::Relaxed);
        self.correlator.close();
    }
}
