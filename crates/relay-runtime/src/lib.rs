//! # relay-runtime
//!
//! Session lifecycle, engine linking, and the tool-execution loop.
//!
//! This crate is transport-agnostic: it never sees a wire frame. The server
//! crate feeds it operations and supplies a [`confirm::ConfirmationGateway`]
//! implementation for server-initiated confirmation round trips.
//!
//! - **Sessions**: [`session::SessionManager`] — create, bind engines, close,
//!   orphan sweep
//! - **Engines**: [`engine::EngineLinkManager`] + [`engine::EngineCatalog`] —
//!   one engine per session, teardown on relink
//! - **Turns**: [`agent`] — the model/tool loop with confirmation gating
//! - **Events**: [`events::EventEmitter`] — in-process lifecycle broadcast

#![deny(unsafe_code)]

pub mod agent;
pub mod confirm;
pub mod context;
pub mod engine;
pub mod errors;
pub mod events;
pub mod provider;
pub mod session;
pub mod testutil;
pub mod tools;

pub use agent::{TurnOptions, TurnOutcome};
pub use confirm::{ConfirmationGateway, ConfirmationOutcome, ConfirmationRequest};
pub use errors::RuntimeError;
pub use provider::{Completion, ModelProvider, ProviderError};
