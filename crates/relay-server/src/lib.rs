//! # relay-server
//!
//! Axum HTTP + `WebSocket` server for the chat relay.
//!
//! - HTTP: the static client page at `/`, optional `/metrics`
//! - `WebSocket` gateway: per-connection reader/writer tasks
//! - Hub: a single task that owns the nickname registry and routes every
//!   frame in arrival order
//! - Graceful shutdown driven by a caller-supplied future

#![deny(unsafe_code)]

pub mod error;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use error::ServerError;
pub use server::{AppState, RelayServer};
pub use shutdown::ShutdownCoordinator;
