//! HTTP routes
//!
//! Every path is treated as an object key:
//! - `GET /{key}?type=url|object|image` - presigned URL, raw bytes, or proxied bytes
//! - `POST /` - multipart upload (`image`, `name`, `destination`)
//! - `DELETE /{key}` - delete the object
//! - `OPTIONS /{key}` - CORS preflight

pub mod objects;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::middleware::apply_cors;
use crate::models::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let max_upload_bytes = state.config.server.max_upload_bytes;

    let router = Router::new()
        .merge(objects::router(state))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http());

    apply_cors(router)
}
