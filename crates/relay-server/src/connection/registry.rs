//! Connection registry — the single source of truth for live connections.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use relay_core::frames::Frame;
use relay_core::ids::ConnectionId;
use relay_runtime::session::SessionManager;

use super::Connection;

/// Registration failure.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The configured connection cap is reached.
    #[error("Connection limit reached ({0})")]
    AtCapacity(usize),
}

/// Tracks live connections, issues ids, and fans out disconnect cleanup.
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Arc<Connection>>,
    sessions: Arc<SessionManager>,
    max_connections: usize,
}

impl ConnectionRegistry {
    /// Create a registry notifying `sessions` on disconnects.
    pub fn new(sessions: Arc<SessionManager>, max_connections: usize) -> Self {
        Self {
            connections: DashMap::new(),
            sessions,
            max_connections,
        }
    }

    /// Register a new connection writing to `outbound`.
    ///
    /// Allocates a fresh id and a fresh correlator. O(1).
    pub fn register(&self, outbound: mpsc::Sender<Frame>) -> Result<Arc<Connection>, RegistryError> {
        if self.connections.len() >= self.max_connections {
            warn!(max = self.max_connections, "connection limit reached");
            return Err(RegistryError::AtCapacity(self.max_connections));
        }
        let id = ConnectionId::new();
        let connection = Arc::new(Connection::new(id.clone(), outbound));
        let _ = self.connections.insert(id.clone(), connection.clone());
        metrics::gauge!("connections_active").increment(1.0);
        metrics::counter!("connections_total").increment(1);
        info!(connection_id = %id, "connection registered");
        Ok(connection)
    }

    /// Unregister a connection.
    ///
    /// Marks it dead, resolves every pending correlator entry to
    /// `ConnectionLost` in one sweep, then orphans the sessions it owned.
    /// Returns `false` if the id was unknown (already unregistered).
    #[instrument(skip(self), fields(connection_id = %connection_id))]
    pub fn unregister(&self, connection_id: &ConnectionId) -> bool {
        let Some((_, connection)) = self.connections.remove(connection_id) else {
            return false;
        };
        connection.close();
        let orphaned = self.sessions.orphan_connection(connection_id);
        metrics::gauge!("connections_active").decrement(1.0);
        info!(orphaned, "connection unregistered");
        true
    }

    /// Look up a connection. O(1).
    pub fn get(&self, connection_id: &ConnectionId) -> Option<Arc<Connection>> {
        self.connections
            .get(connection_id)
            .map(|entry| entry.clone())
    }

    /// Number of live connections.
    pub fn count(&self) -> usize {
        self.connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use relay_runtime::engine::{EngineCatalog, EngineLinkManager};
    use relay_runtime::session::SessionState;
    use serde_json::json;

    fn make_registry(max: usize) -> ConnectionRegistry {
        let links = Arc::new(EngineLinkManager::new(Arc::new(EngineCatalog::new())));
        let sessions = Arc::new(SessionManager::new(links, Duration::ZERO));
        ConnectionRegistry::new(sessions, max)
    }

    #[tokio::test]
    async fn register_allocates_unique_ids() {
        let registry = make_registry(10);
        let (tx, _rx) = mpsc::channel(8);
        let a = registry.register(tx.clone()).unwrap();
        let b = registry.register(tx).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(registry.count(), 2);
        assert!(registry.get(a.id()).is_some());
    }

    #[tokio::test]
    async fn capacity_enforced() {
        let registry = make_registry(1);
        let (tx, _rx) = mpsc::channel(8);
        let _first = registry.register(tx.clone()).unwrap();
        let err = registry.register(tx).unwrap_err();
        assert!(matches!(err, RegistryError::AtCapacity(1)));
    }

    #[tokio::test]
    async fn unregister_unknown_is_noop() {
        let registry = make_registry(10);
        assert!(!registry.unregister(&ConnectionId::from("ghost")));
    }

    #[tokio::test]
    async fn unregister_aborts_pending_and_orphans_sessions() {
        let links = Arc::new(EngineLinkManager::new(Arc::new(EngineCatalog::new())));
        let sessions = Arc::new(SessionManager::new(links, Duration::ZERO));
        let registry = ConnectionRegistry::new(sessions.clone(), 10);

        let (tx, mut rx) = mpsc::channel(8);
        let connection = registry.register(tx).unwrap();
        let session = sessions.create_session(connection.id());

        // Two requests pending on the connection.
        let mut handles = Vec::new();
        for _ in 0..2 {
            let conn = connection.clone();
            handles.push(tokio::spawn(async move {
                conn.correlator()
                    .send_request("confirmation", json!({}), Duration::from_secs(30))
                    .await
            }));
        }
        for _ in 0..2 {
            let _ = rx.recv().await.unwrap();
        }

        assert!(registry.unregister(connection.id()));
        assert_eq!(registry.count(), 0);

        // Both resolve to ConnectionLost in one sweep.
        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert_eq!(err, crate::correlator::CorrelationError::ConnectionLost);
        }
        // The owned session moved to Terminating.
        assert_eq!(session.state(), SessionState::Terminating);

        // Second unregister is a no-op.
        assert!(!registry.unregister(connection.id()));
    }
}
