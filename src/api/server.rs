//! HTTP server implementation for the API

use anyhow::Result;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use super::handlers;
use super::models::{ErrorResponse, ScrapeRequest, ScrapeResponse};
use crate::browser::SessionLauncher;
use crate::config::Config;

/// Shared application state
pub struct AppState<L: SessionLauncher> {
    pub launcher: Arc<L>,
    pub config: Arc<Config>,
    permits: Arc<Semaphore>,
}

impl<L: SessionLauncher> AppState<L> {
    pub fn new(launcher: Arc<L>, config: Arc<Config>) -> Self {
        let permits = Arc::new(Semaphore::new(config.server.max_concurrent_scrapes.max(1)));
        Self {
            launcher,
            config,
            permits,
        }
    }
}

impl<L: SessionLauncher> Clone for AppState<L> {
    fn clone(&self) -> Self {
        Self {
            launcher: self.launcher.clone(),
            config: self.config.clone(),
            permits: self.permits.clone(),
        }
    }
}

/// Build the application router
pub fn router<L: SessionLauncher>(state: AppState<L>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/scrape", post(scrape_handler::<L>))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}

/// Configure and start the HTTP server
pub async fn start_http_server<L: SessionLauncher>(launcher: Arc<L>, config: Arc<Config>) -> Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app = router(AppState::new(launcher, config));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🌐 API server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse::new(message))).into_response()
}

/// Scrape handler
async fn scrape_handler<L: SessionLauncher>(
    State(state): State<AppState<L>>,
    payload: std::result::Result<Json<ScrapeRequest>, JsonRejection>,
) -> Response {
    let term = match handlers::validate_request(payload.ok().map(|Json(request)| request)) {
        Ok(term) => term,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };

    let _permit = match state.permits.clone().acquire_owned().await {
        Ok(permit) => permit,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    match handlers::scrape_links(state.launcher.clone(), state.config.clone(), term).await {
        Ok(links) => (StatusCode::OK, Json(ScrapeResponse { links })).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
