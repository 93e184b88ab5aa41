//! HTTP front end: JSON endpoints plus an SSE stream for chat turns.

pub mod routes;

use crate::auth::{ApiAuth, require_bearer};
use crate::chat::ChatService;
use crate::db::DatabaseSessionProvider;
use crate::error::{DashboardError, DbResult};
use crate::explorer::TableExplorer;
use crate::ingest::TableUploader;
use crate::session::SessionStore;
use axum::Router;
use axum::middleware;
use axum::routing::{get, post, put};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

/// How long in-flight requests and open SSE streams get after a shutdown signal.
const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionStore,
    pub chat: ChatService,
    pub uploader: TableUploader,
    pub explorer: TableExplorer,
    pub provider: Arc<DatabaseSessionProvider>,
}

impl AppState {
    pub fn new(chat: ChatService, sessions: SessionStore) -> Self {
        let provider = chat.provider().clone();
        Self {
            sessions,
            uploader: TableUploader::new(provider.embedded_path().to_path_buf()),
            explorer: TableExplorer::new(provider.clone()),
            provider,
            chat,
        }
    }
}

/// Build the application router. `auth` guards everything under `/api`.
pub fn router(state: AppState, auth: ApiAuth) -> Router {
    let api = Router::new()
        .route("/sessions", post(routes::create_session))
        .route(
            "/sessions/{id}",
            get(routes::get_session).delete(routes::delete_session),
        )
        .route("/sessions/{id}/connection", put(routes::configure_connection))
        .route(
            "/sessions/{id}/messages",
            get(routes::list_messages)
                .post(routes::ask)
                .delete(routes::clear_messages),
        )
        .route("/sessions/{id}/uploads", post(routes::upload))
        .route("/tables", get(routes::list_tables))
        .route("/tables/{name}", get(routes::view_table))
        .route_layer(middleware::from_fn_with_state(
            Arc::new(auth),
            require_bearer,
        ));

    Router::new()
        .route("/health", get(routes::health))
        .nest("/api", api)
        .with_state(state)
}

/// Serves the router until SIGINT/SIGTERM, then closes every database handle.
pub struct HttpServer {
    state: AppState,
    auth: ApiAuth,
    host: String,
    port: u16,
}

impl HttpServer {
    pub fn new(state: AppState, auth: ApiAuth, host: impl Into<String>, port: u16) -> Self {
        Self {
            state,
            auth,
            host: host.into(),
            port,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub async fn run(self) -> DbResult<()> {
        let bind_addr = self.bind_addr();
        let provider = self.state.provider.clone();
        let auth_enabled = self.auth.is_enabled();
        let app = router(self.state, self.auth);

        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            DashboardError::connection(
                format!("Failed to bind to {}: {}", bind_addr, e),
                "Check that the port is available",
            )
        })?;
        info!(addr = %bind_addr, auth_enabled, "Dashboard listening");

        let shutdown_notify = Arc::new(tokio::sync::Notify::new());
        let notify = shutdown_notify.clone();
        let shutdown_signal = async move {
            wait_for_signal().await;
            notify.notify_one();
        };

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal);

        // Open SSE streams can hold the server past the signal; cap the wait
        tokio::select! {
            result = server => {
                match result {
                    Ok(()) => info!("HTTP server stopped"),
                    Err(e) => {
                        error!(error = %e, "HTTP server error");
                        return Err(DashboardError::internal(format!("HTTP server error: {}", e)));
                    }
                }
            }
            _ = async {
                shutdown_notify.notified().await;
                info!(
                    timeout_secs = GRACEFUL_TIMEOUT.as_secs(),
                    "Waiting for connections to close (send signal again to force exit)..."
                );
                tokio::select! {
                    _ = tokio::time::sleep(GRACEFUL_TIMEOUT) => {
                        warn!("Graceful shutdown timeout, forcing exit");
                    }
                    _ = wait_for_signal() => {
                        warn!("Received second signal, forcing immediate exit");
                    }
                }
            } => {}
        }

        info!("Closing database handles");
        provider.close_all().await;
        Ok(())
    }
}

async fn wait_for_signal() {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
