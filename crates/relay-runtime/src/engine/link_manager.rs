//! Engine link manager — enforces the one-engine-per-session invariant.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use relay_core::ids::SessionId;

use super::catalog::EngineCatalog;
use super::Engine;
use crate::errors::RuntimeError;

/// Binds at most one engine to each session and owns teardown on relink and
/// unlink.
pub struct EngineLinkManager {
    catalog: Arc<EngineCatalog>,
    links: DashMap<SessionId, Arc<Engine>>,
}

impl EngineLinkManager {
    /// Create a new link manager over a catalog.
    pub fn new(catalog: Arc<EngineCatalog>) -> Self {
        Self {
            catalog,
            links: DashMap::new(),
        }
    }

    /// The engine catalog.
    pub fn catalog(&self) -> &Arc<EngineCatalog> {
        &self.catalog
    }

    /// Link an engine of `engine_type` to the session.
    ///
    /// If a different engine is already linked it is released first — its
    /// cancellation token fires so in-flight tool calls stop — before the new
    /// engine becomes addressable. If building the new engine fails, the
    /// existing link is left untouched.
    pub async fn link(
        &self,
        session_id: &SessionId,
        engine_type: &str,
    ) -> Result<Arc<Engine>, RuntimeError> {
        let factory = self.catalog.get(engine_type).ok_or_else(|| {
            RuntimeError::EngineLink(format!("Unknown engine type: {engine_type}"))
        })?;

        let engine = Arc::new(factory.build(session_id).await?);

        if let Some((_, old)) = self.links.remove(session_id) {
            debug!(
                session_id = %session_id,
                old_engine_id = %old.id(),
                "releasing previously linked engine"
            );
            old.shutdown();
        }
        let _ = self.links.insert(session_id.clone(), engine.clone());
        debug!(
            session_id = %session_id,
            engine_id = %engine.id(),
            engine_type,
            "engine linked"
        );
        Ok(engine)
    }

    /// Release the linked engine, if any. Returns whether one was linked.
    pub fn unlink(&self, session_id: &SessionId) -> bool {
        match self.links.remove(session_id) {
            Some((_, engine)) => {
                engine.shutdown();
                debug!(session_id = %session_id, engine_id = %engine.id(), "engine unlinked");
                true
            }
            None => false,
        }
    }

    /// Get the linked engine.
    pub fn get(&self, session_id: &SessionId) -> Result<Arc<Engine>, RuntimeError> {
        self.links
            .get(session_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| {
                warn!(session_id = %session_id, "no engine linked");
                RuntimeError::EngineNotLinked(session_id.to_string())
            })
    }

    /// Whether the session has a linked engine.
    pub fn is_linked(&self, session_id: &SessionId) -> bool {
        self.links.contains_key(session_id)
    }

    /// Number of live links.
    pub fn linked_count(&self) -> usize {
        self.links.len()
    }
}
