//! `RelayServer`: Axum HTTP + WebSocket server.
//!
//! | Path | Upgrade | Plain HTTP |
//! |------|---------|------------|
//! | `/` | relay connection | static client page |
//! | `/metrics` | - | Prometheus text (only when enabled) |
//! | anything else | relay connection | `404 Not found` |

use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{WebSocketUpgrade, rejection::WebSocketUpgradeRejection};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use metrics_exporter_prometheus::PrometheusHandle;
use relay_core::ConnectionId;
use relay_settings::ServerSettings;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::ServerError;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::hub::{Hub, HubHandle};
use crate::websocket::session::run_connection;

/// Body of the 500 response when the client page cannot be read.
pub const CLIENT_LOAD_ERROR: &str = "Erro ao carregar o cliente.";

/// Body of the 404 response.
pub const NOT_FOUND: &str = "Not found";

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Event queue of the relay hub.
    pub hub: HubHandle,
    /// HTML document served at `/`.
    pub client_file: Arc<PathBuf>,
    /// Per-connection outbound queue depth.
    pub outbound_buffer: usize,
    /// Shutdown signal handed to every connection task.
    pub shutdown: ShutdownCoordinator,
    /// Prometheus handle, present when metrics are enabled.
    pub metrics: Option<PrometheusHandle>,
}

/// The chat relay server.
pub struct RelayServer {
    settings: ServerSettings,
    hub: HubHandle,
    hub_task: JoinHandle<()>,
    shutdown: ShutdownCoordinator,
    metrics: Option<PrometheusHandle>,
}

impl RelayServer {
    /// Create a server and start its hub task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(settings: ServerSettings, metrics: Option<PrometheusHandle>) -> Self {
        let (hub, hub_task) = Hub::spawn(settings.event_buffer);
        Self {
            settings,
            hub,
            hub_task,
            shutdown: ShutdownCoordinator::new(),
            metrics,
        }
    }

    /// Shutdown coordinator. Firing it stops the listener and closes every
    /// open connection.
    pub fn shutdown(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: self.hub.clone(),
            client_file: Arc::new(PathBuf::from(&self.settings.client_file)),
            outbound_buffer: self.settings.outbound_buffer,
            shutdown: self.shutdown.clone(),
            metrics: self.metrics.clone(),
        };

        let mut router = Router::new().route("/", any(root_handler));
        if state.metrics.is_some() {
            router = router.route("/metrics", get(metrics_handler));
        }
        router
            .fallback(fallback_handler)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the configured `host:port`.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let addr = self.settings.bind_addr();
        TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })
    }

    /// Serve on `listener` until `signal` resolves or the coordinator fires.
    ///
    /// Once the listener stops, open connections are closed and the hub is
    /// given time to announce every departure.
    pub async fn serve<F>(self, listener: TcpListener, signal: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        info!(addr = %local_addr, "relay server listening");
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    () = signal => {}
                    () = token.cancelled() => {}
                }
                token.cancel();
            })
            .await?;

        let Self {
            hub,
            hub_task,
            shutdown,
            ..
        } = self;
        drop(hub);
        let drained = shutdown.graceful_shutdown(vec![hub_task], None).await;
        info!(drained, "relay server stopped");
        Ok(())
    }

    /// Bind and serve in a background task. Returns the bound address.
    ///
    /// Stop it through [`RelayServer::shutdown`] before calling this, via a
    /// clone of the coordinator.
    pub async fn listen(self) -> Result<(SocketAddr, JoinHandle<Result<(), ServerError>>), ServerError> {
        let listener = self.bind().await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(self.serve(listener, std::future::pending()));
        Ok((addr, handle))
    }
}

/// `/`: relay connection on upgrade, client page otherwise.
async fn root_handler(
    State(state): State<AppState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match upgrade {
        Ok(ws) => accept(ws, state),
        Err(_) => serve_client(&state.client_file).await,
    }
}

/// Unknown paths: relay connection on upgrade, 404 otherwise.
async fn fallback_handler(
    State(state): State<AppState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match upgrade {
        Ok(ws) => accept(ws, state),
        Err(_) => (StatusCode::NOT_FOUND, NOT_FOUND).into_response(),
    }
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => (StatusCode::NOT_FOUND, NOT_FOUND).into_response(),
    }
}

fn accept(ws: WebSocketUpgrade, state: AppState) -> Response {
    let id = ConnectionId::new();
    let shutdown = state.shutdown.token();
    ws.on_upgrade(move |socket| {
        run_connection(socket, id, state.hub, state.outbound_buffer, shutdown)
    })
}

async fn serve_client(path: &Path) -> Response {
    match tokio::fs::read(path).await {
        Ok(body) => ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], body).into_response(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read client page");
            (StatusCode::INTERNAL_SERVER_ERROR, CLIENT_LOAD_ERROR).into_response()
        }
    }
}
