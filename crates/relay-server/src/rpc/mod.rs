//! Op registry, handler context, and the built-in session handlers.

pub mod context;
pub mod error;
pub mod handlers;
pub mod registry;

pub use context::{OpContext, ServerState};
pub use error::OpError;
pub use registry::{OpHandler, OpRegistry};
