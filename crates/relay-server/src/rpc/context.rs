//! Op dependency-injection context.

use std::sync::Arc;

use relay_runtime::session::SessionManager;

use crate::config::ServerConfig;
use crate::connection::Connection;

/// Shared server state, independent of any one connection.
pub struct ServerState {
    /// Session lifecycle manager (owns the engine link manager).
    pub sessions: Arc<SessionManager>,
    /// Server configuration.
    pub config: ServerConfig,
}

/// Context passed to every op handler: shared state plus the connection the
/// request arrived on.
#[derive(Clone)]
pub struct OpContext {
    /// Shared server state.
    pub state: Arc<ServerState>,
    /// The calling connection.
    pub connection: Arc<Connection>,
}
