use crate::config::Config;
use crate::storage::Storage;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
    /// Used to dereference presigned URLs for `type=image`.
    pub http: reqwest::Client,
    pub config: Config,
}
