// Bucket Proxy - HTTP front for a single object-storage bucket

pub mod config;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod storage;
pub mod types;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;
pub use storage::Storage;

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
