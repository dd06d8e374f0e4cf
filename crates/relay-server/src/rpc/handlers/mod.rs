//! Op handlers.

pub mod session;

use crate::rpc::registry::OpRegistry;

/// Register every built-in op handler.
pub fn register_all(registry: &mut OpRegistry) {
    session::register(registry);
}
