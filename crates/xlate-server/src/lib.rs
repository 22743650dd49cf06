//! Axum composition root for live-xlate: the `/ws/audio` (solo) and
//! `/ws/session` (room) WebSocket endpoints, their shared wire protocol,
//! and the `bootstrap`/`ServerConfig` wiring `main.rs` drives.
//!
//! Nothing here implements translation itself — that's
//! `xlate-engine`/`xlate-capabilities`. This crate only decodes bytes
//! off the wire, drives the engine's session/room types, and encodes
//! their results back onto the wire.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Used only by the binary target, not the library.
use tracing_subscriber as _;

// Pulled in transitively via axum but not named directly by any handler.
use thiserror as _;
use tower as _;

// Planned integration-test dependencies.
#[cfg(test)]
use tokio_test as _;

pub mod bootstrap;
pub mod diagnostics;
pub mod error;
pub mod handlers;
pub mod query;
pub mod routes;
pub mod state;
pub mod wire;

pub use bootstrap::{bootstrap, start_server, CorsConfig, ServerConfig};
pub use state::AppState;
