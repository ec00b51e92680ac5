//! API Server - HTTP server for the mail service

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

use crate::api::handlers::{self, AppState};
use crate::api::middleware::{panic_response, security_headers};
use crate::config::ServerConfig;

/// Build the full router
///
/// Unknown paths and known paths hit with the wrong method both get the
/// JSON 404 body.
pub fn router(state: Arc<AppState>, body_limit: usize) -> Router {
    with_middleware(routes(), body_limit).with_state(state)
}

/// Service routes without middleware
pub fn routes() -> Router<Arc<AppState>> {
    let api_routes = Router::new()
        .route(
            "/send-email",
            post(handlers::send_email).fallback(handlers::not_found),
        )
        .route(
            "/process-template",
            post(handlers::process_template).fallback(handlers::not_found),
        )
        .route(
            "/fetch-data",
            get(handlers::fetch_data).fallback(handlers::not_found),
        )
        .route(
            "/upload-attachment",
            post(handlers::upload_attachment).fallback(handlers::not_found),
        )
        .route("/info", get(handlers::info).fallback(handlers::not_found));

    Router::new()
        .route("/health", get(handlers::health).fallback(handlers::not_found))
        .nest("/api", api_routes)
        .fallback(handlers::not_found)
}

/// Wrap routes in the body limit, panic catcher, security headers, CORS and tracing
pub fn with_middleware(routes: Router<Arc<AppState>>, body_limit: usize) -> Router<Arc<AppState>> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    routes
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn(security_headers))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// API Server
pub struct ApiServer {
    state: Arc<AppState>,
    addr: String,
    body_limit: usize,
}

impl ApiServer {
    pub fn new(state: AppState, config: &ServerConfig) -> Self {
        Self {
            state: Arc::new(state),
            addr: format!("{}:{}", config.host, config.port),
            body_limit: config.max_body_bytes,
        }
    }

    pub fn router(&self) -> Router {
        router(self.state.clone(), self.body_limit)
    }

    /// Serve until SIGINT or SIGTERM
    pub async fn run(&self) -> std::io::Result<()> {
        let router = self.router();

        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        info!(addr = %listener.local_addr()?, "Mail service listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Mail service stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
