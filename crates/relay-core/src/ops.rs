//! Operation names recognized on the wire.
//!
//! Callers may extend the set; these are the operations the relay itself
//! understands.

/// Create a new session bound to the calling connection.
pub const CREATE_SESSION: &str = "create_session";

/// List the engine types available in the catalog.
pub const ENGINE_TYPES: &str = "engine_types";

/// Link an engine of a given type to a session.
pub const LINK_ENGINE: &str = "link_engine";

/// Run one user turn through the session's linked engine.
pub const USE_ENGINE: &str = "use_engine";

/// Close a session and tear down its engine.
pub const CLOSE_SESSION: &str = "close_session";

/// Server-initiated confirmation round trip, answered with
/// `{"confirmed": bool}`.
pub const CONFIRMATION: &str = "confirmation";
