//! WebSocket connection management, nickname registry, and message routing.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `connection` | Outbound handle for one client (`ClientConnection`) |
//! | `session` | WebSocket upgrade target: per-connection read/write loops |
//! | `fanout` | Set of open connections and frame delivery |
//! | `registry` | Connection → nickname sessions, uniqueness |
//! | `router` | Broadcast and direct-message dispatch |
//! | `hub` | Lifecycle state machine and the single task that owns it |
//!
//! ## Data Flow
//!
//! `session` → `HubEvent` queue → `hub` (gate, register, `router`) →
//! `fanout` → each connection's outbound queue → `session` writer.

pub mod connection;
pub mod fanout;
pub mod hub;
pub mod registry;
pub mod router;
pub mod session;
