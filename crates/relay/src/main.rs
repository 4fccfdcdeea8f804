//! # relay
//!
//! Chat relay server binary: resolves settings, sets up logging and
//! metrics, then serves the client page and WebSocket relay until
//! Ctrl-C or SIGTERM.

#![deny(unsafe_code)]

mod logging;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use relay_server::RelayServer;
use relay_settings::RelaySettings;

/// WebSocket chat relay.
#[derive(Parser, Debug)]
#[command(name = "relay", about = "WebSocket chat relay server")]
struct Cli {
    /// Settings file (JSON). Falls back to `$RELAY_SETTINGS`, then `./relay.json`.
    #[arg(long, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// HTML document served at `/` (overrides settings).
    #[arg(long, value_name = "PATH")]
    client_file: Option<PathBuf>,
}

impl Cli {
    /// Apply command-line flags, the highest-priority settings layer.
    fn apply(&self, settings: &mut RelaySettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(path) = &self.client_file {
            settings.server.client_file = path.display().to_string();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // Settings come first: they carry the log level
    let mut settings =
        relay_settings::load_settings(args.settings.as_deref()).context("Failed to load settings")?;
    args.apply(&mut settings);

    logging::init_subscriber(&settings.logging.level, settings.logging.json);

    let metrics = if settings.server.metrics_enabled {
        Some(relay_server::metrics::install_recorder().context("Failed to install metrics recorder")?)
    } else {
        None
    };

    let server = RelayServer::new(settings.server.clone(), metrics);
    let listener = server.bind().await.context("Failed to bind server")?;
    let addr = listener.local_addr().context("Failed to read bound address")?;

    tracing::info!(
        client_file = %settings.server.client_file,
        metrics = settings.server.metrics_enabled,
        "Relay listening on http://{addr}"
    );

    server
        .serve(listener, shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                let _ = sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    tracing::info!("Shutting down...");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_leave_settings_untouched() {
        let cli = Cli::parse_from(["relay"]);
        let mut settings = RelaySettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings, RelaySettings::default());
    }

    #[test]
    fn cli_flags_override_settings() {
        let cli = Cli::parse_from([
            "relay",
            "--host",
            "127.0.0.1",
            "--port",
            "8080",
            "--client-file",
            "/srv/chat/index.html",
        ]);
        let mut settings = RelaySettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.client_file, "/srv/chat/index.html");
    }

    #[test]
    fn cli_settings_path() {
        let cli = Cli::parse_from(["relay", "--settings", "/etc/relay.json"]);
        assert_eq!(cli.settings, Some(PathBuf::from("/etc/relay.json")));
    }

    #[test]
    fn cli_rejects_invalid_port() {
        assert!(Cli::try_parse_from(["relay", "--port", "70000"]).is_err());
    }
}
