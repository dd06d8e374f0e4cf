//! # relay-server
//!
//! The connection-facing half of the relay:
//!
//! - **Correlator**: request/response and server-initiated round-trip
//!   matching over one ordered connection, with per-request deadlines and a
//!   single sweeper task
//! - **Connections**: per-peer state with a bounded FIFO outbound queue, and
//!   the registry that owns them
//! - **Op dispatch**: the registry of session-management operations plus the
//!   frame router that keeps the read loop non-blocking
//! - **Confirmation gateway**: server-initiated confirmation round trips
//!   implemented over the correlator
//! - **Transport adapter**: an Axum WebSocket endpoint with heartbeat; the
//!   rest of the crate never touches a socket

#![deny(unsafe_code)]

pub mod config;
pub mod confirm;
pub mod connection;
pub mod correlator;
pub mod dispatch;
pub mod rpc;
pub mod server;
pub mod ws;

pub use config::ServerConfig;
pub use confirm::ConnectionGateway;
pub use connection::{Connection, ConnectionRegistry};
pub use correlator::{CorrelationError, Correlator};
pub use server::RelayServer;
