//! Engine catalog — the table of engine types that can be linked.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use relay_core::ids::SessionId;

use super::Engine;
use crate::errors::RuntimeError;

/// Builds engine instances of one named type.
///
/// A factory wires up the provider, tool registry, and system prompt for its
/// engine type. Building may do I/O (loading tool tables, warming caches),
/// hence async.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    /// The engine type name clients pass to `link_engine`.
    fn engine_type(&self) -> &str;

    /// Short human-readable description.
    fn description(&self) -> &str {
        ""
    }

    /// Build a fresh engine instance for the given session.
    async fn build(&self, session_id: &SessionId) -> Result<Engine, RuntimeError>;
}

/// Registry of engine factories, keyed by engine type.
#[derive(Default)]
pub struct EngineCatalog {
    factories: HashMap<String, Arc<dyn EngineFactory>>,
}

impl EngineCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a factory. Overwrites any existing factory for the same type.
    pub fn register(&mut self, factory: Arc<dyn EngineFactory>) {
        let _ = self
            .factories
            .insert(factory.engine_type().to_owned(), factory);
    }

    /// Look up a factory by engine type.
    pub fn get(&self, engine_type: &str) -> Option<Arc<dyn EngineFactory>> {
        self.factories.get(engine_type).cloned()
    }

    /// All registered engine types, sorted alphabetically.
    pub fn types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.keys().cloned().collect();
        types.sort();
        types
    }

    /// Number of registered engine types.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}
