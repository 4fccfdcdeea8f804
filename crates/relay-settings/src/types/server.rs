//! Server network settings.

use serde::{Deserialize, Serialize};

/// Listener, static client page, and queue sizing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address. `0.0.0.0` listens on all interfaces.
    pub host: String,
    /// Listener port for both the client page and WebSocket upgrades.
    pub port: u16,
    /// Path of the HTML document served at `/`.
    pub client_file: String,
    /// Per-connection outbound frame queue depth.
    pub outbound_buffer: usize,
    /// Hub event queue depth.
    pub event_buffer: usize,
    /// Install the Prometheus recorder and expose `/metrics`.
    pub metrics_enabled: bool,
}

impl ServerSettings {
    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            client_file: "./index.html".to_string(),
            outbound_buffer: 64,
            event_buffer: 1024,
            metrics_enabled: false,
        }
    }
}
