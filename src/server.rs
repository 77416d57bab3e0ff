//! Read-only HTTP projection of rewritten articles.
//!
//! | Route | Response |
//! |-------|----------|
//! | `GET /api/news` | JSON array of `{id, title, body}`, newest first |
//!
//! A store failure answers `500` with `{"error": "<message>"}`.

use crate::error::StorageError;
use crate::models::PublishedArticle;
use crate::store::Store;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument};

/// Default cap on the number of articles returned.
pub const DEFAULT_PUBLISHED_LIMIT: u32 = 20;

#[derive(Debug, Clone)]
struct AppState {
    store: Store,
    limit: u32,
}

/// A store failure surfaced to an HTTP caller.
#[derive(Debug)]
pub struct ApiError(StorageError);

impl From<StorageError> for ApiError {
    fn from(value: StorageError) -> Self {
        Self(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!(error = %self.0, "Failed to read published articles");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

/// Build the router serving at most `limit` articles per request.
pub fn router(store: Store, limit: u32) -> Router {
    Router::new()
        .route("/api/news", get(list_news))
        .with_state(AppState { store, limit })
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn list_news(
    State(state): State<AppState>,
) -> Result<Json<Vec<PublishedArticle>>, ApiError> {
    let articles = state.store.select_published(state.limit).await?;
    Ok(Json(articles))
}

/// Bind the API address.
#[instrument(level = "info", err)]
pub async fn bind(addr: &str) -> std::io::Result<TcpListener> {
    TcpListener::bind(addr).await
}

/// Serve the projection on `listener` until `cancel` fires.
#[instrument(level = "info", skip_all, err)]
pub async fn serve(
    listener: TcpListener,
    store: Store,
    limit: u32,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    info!(addr = %listener.local_addr()?, "News API is running on /api/news");

    axum::serve(listener, router(store, limit))
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;

    info!("News API stopped");
    Ok(())
}
