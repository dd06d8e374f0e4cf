//! `RelayServer` — wires the registries together and serves the WebSocket
//! endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use tokio_util::sync::CancellationToken;
use tracing::info;

use relay_runtime::engine::{EngineCatalog, EngineLinkManager};
use relay_runtime::session::manager::spawn_sweeper;
use relay_runtime::session::SessionManager;

use crate::config::ServerConfig;
use crate::connection::ConnectionRegistry;
use crate::rpc::context::ServerState;
use crate::rpc::handlers;
use crate::rpc::registry::OpRegistry;
use crate::ws;

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Op registry.
    pub registry: Arc<OpRegistry>,
    /// Shared server state (sessions, config).
    pub state: Arc<ServerState>,
    /// Live connections.
    pub connections: Arc<ConnectionRegistry>,
}

/// The relay server.
pub struct RelayServer {
    config: ServerConfig,
    state: Arc<ServerState>,
    registry: Arc<OpRegistry>,
    connections: Arc<ConnectionRegistry>,
    shutdown: CancellationToken,
}

impl RelayServer {
    /// Create a server over an engine catalog with the built-in session ops.
    pub fn new(config: ServerConfig, catalog: Arc<EngineCatalog>) -> Self {
        let mut registry = OpRegistry::new();
        handlers::register_all(&mut registry);
        Self::with_registry(config, catalog, registry)
    }

    /// Create a server with a caller-assembled op registry (built-in ops are
    /// whatever the caller registered).
    pub fn with_registry(
        config: ServerConfig,
        catalog: Arc<EngineCatalog>,
        registry: OpRegistry,
    ) -> Self {
        let links = Arc::new(EngineLinkManager::new(catalog));
        let sessions = Arc::new(SessionManager::new(links, config.session_grace()));
        let connections = Arc::new(ConnectionRegistry::new(
            sessions.clone(),
            config.max_connections,
        ));
        let state = Arc::new(ServerState {
            sessions,
            config: config.clone(),
        });
        Self {
            config,
            state,
            registry: Arc::new(registry),
            connections,
            shutdown: CancellationToken::new(),
        }
    }

    /// The session manager.
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.state.sessions
    }

    /// The connection registry.
    pub fn connections(&self) -> &Arc<ConnectionRegistry> {
        &self.connections
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Token that stops `serve` when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            registry: self.registry.clone(),
            state: self.state.clone(),
            connections: self.connections.clone(),
        };
        Router::new()
            .route("/health", get(health_handler))
            .route("/ws", get(ws::ws_handler))
            .with_state(state)
    }

    /// Bind and serve until the shutdown token fires.
    ///
    /// Also runs the orphan-session sweeper for the lifetime of the server.
    pub async fn serve(self) -> std::io::Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!(addr = %listener.local_addr()?, "relay server listening");

        let sweeper = spawn_sweeper(
            self.state.sessions.clone(),
            self.config.sweep_interval(),
            self.shutdown.clone(),
        );

        let shutdown = self.shutdown.clone();
        let router = self.router();
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await?;

        self.shutdown.cancel();
        let _ = sweeper.await;
        info!("relay server stopped");
        Ok(())
    }
}

/// GET /health
async fn health_handler(State(app): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "connections": app.connections.count(),
        "sessions": app.state.sessions.session_count(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn build_router_creates_routes() {
        let server = RelayServer::new(ServerConfig::default(), Arc::new(EngineCatalog::new()));
        let _router = server.router();
        assert_eq!(server.connections().count(), 0);
        assert_eq!(server.sessions().session_count(), 0);
    }

    #[tokio::test]
    async fn shutdown_token_is_shared() {
        let server = RelayServer::new(ServerConfig::default(), Arc::new(EngineCatalog::new()));
        let token = server.shutdown_token();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(server.shutdown_token().is_cancelled());
    }
}
