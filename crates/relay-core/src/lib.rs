//! # relay-core
//!
//! Foundation types for the chat relay.
//!
//! - **Identifiers**: [`ids::ConnectionId`], the branded handle for one live transport
//! - **Protocol**: [`protocol::ClientFrame`] (inbound) and [`protocol::ServerFrame`] (outbound)
//! - **Notices**: [`notices`], the server-originated notification texts
//! - **Errors**: [`errors::FrameError`] and [`errors::RegisterError`] via `thiserror`
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by `relay-server` and the `relay` binary.

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod notices;
pub mod protocol;

pub use errors::{FrameError, RegisterError};
pub use ids::ConnectionId;
pub use protocol::{ClientFrame, ServerFrame};
