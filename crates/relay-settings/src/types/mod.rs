//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` for the JSON file
//! format. Each type implements [`Default`] with production default values,
//! and `#[serde(default)]` allows partial JSON: missing fields get their
//! default value during deserialization.

mod logging;
mod server;

pub use logging::*;
pub use server::*;

use serde::{Deserialize, Serialize};

/// Root settings type for the relay.
///
/// # JSON Format
///
/// ```json
/// {
///   "server": { "port": 8080, "clientFile": "/srv/chat/index.html" },
///   "logging": { "level": "debug" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Listener, client page, and queue sizing.
    pub server: ServerSettings,
    /// Log level and format.
    pub logging: LoggingSettings,
}

impl RelaySettings {
    /// Correct values that would leave the server unable to run.
    ///
    /// Called automatically during loading. Invalid values are replaced
    /// with a warning rather than rejected.
    pub fn validate(&mut self) {
        let defaults = ServerSettings::default();
        let server = &mut self.server;
        if server.outbound_buffer == 0 {
            tracing::warn!(
                "outbound_buffer must be positive, using {}",
                defaults.outbound_buffer
            );
            server.outbound_buffer = defaults.outbound_buffer;
        }
        if server.event_buffer == 0 {
            tracing::warn!(
                "event_buffer must be positive, using {}",
                defaults.event_buffer
            );
            server.event_buffer = defaults.event_buffer;
        }
        if server.host.trim().is_empty() {
            tracing::warn!("empty host, using {}", defaults.host);
            server.host = defaults.host;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
