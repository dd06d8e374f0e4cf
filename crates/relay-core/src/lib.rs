//! # relay-core
//!
//! Foundation types shared by every relay crate.
//!
//! - **Branded IDs**: `ConnectionId`, `SessionId`, `EngineId`, `ToolCallId`
//!   newtypes for type safety
//! - **Wire frames**: the four message kinds carried over a connection
//!   (`request`, `response`, `server_request`, `server_response`)
//! - **Error codes**: machine-readable wire error codes
//! - **Tools**: tool schema, tool call, and tool result types plus the
//!   routing context attached to confirmation round trips

#![deny(unsafe_code)]

pub mod errors;
pub mod frames;
pub mod ids;
pub mod ops;
pub mod tools;

pub use errors::{ErrorBody, ErrorCode};
pub use frames::Frame;
pub use ids::{ConnectionId, EngineId, SessionId, ToolCallId};
pub use tools::{RoutingContext, ToolCall, ToolResult, ToolSchema};
