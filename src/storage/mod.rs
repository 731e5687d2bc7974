//! Storage client adapter
//!
//! [`Storage`] wraps one bucket and exposes the operations the HTTP layer
//! needs. The actual wire calls live behind [`ObjectStore`], implemented by
//! [`S3Client`] for S3-compatible services and [`MemoryStore`] for tests and
//! local runs.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::StorageConfig;

pub mod memory;
pub mod s3_client;

pub use memory::MemoryStore;
pub use s3_client::S3Client;

/// Metadata entry carrying the object's MIME type.
pub const CONTENT_TYPE_METADATA: &str = "Content-Type";

/// Default validity of a presigned read URL.
pub const DEFAULT_PRESIGN_EXPIRY_SECS: u32 = 300;

/// An object as held by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub key: String,
    pub body: Bytes,
    pub content_type: String,
    pub metadata: HashMap<String, String>,
}

/// Failure reported by a backend, before the adapter classifies it.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("object not found")]
    NotFound,

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Error uploading file {0}")]
    Upload(String),

    #[error("Error deleting file {0}")]
    Delete(String),

    #[error("Object with key '{0}' does not exist.")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    Backend(#[from] BackendError),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Raw operations against a single bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Name of the bucket this store is bound to.
    fn bucket(&self) -> &str;

    async fn put(&self, object: &StoredObject) -> Result<(), BackendError>;

    /// Succeeds when the object exists; `BackendError::NotFound` when it does not.
    async fn head(&self, key: &str) -> Result<(), BackendError>;

    async fn get(&self, key: &str) -> Result<StoredObject, BackendError>;

    async fn delete(&self, key: &str) -> Result<(), BackendError>;

    async fn presign_get(&self, key: &str, expiry_secs: u32) -> Result<String, BackendError>;
}

/// Long-lived handle to the bucket, cheap to clone into request handlers.
#[derive(Clone)]
pub struct Storage {
    backend: Arc<dyn ObjectStore>,
    presign_expiry_secs: u32,
}

impl Storage {
    pub fn new(backend: Arc<dyn ObjectStore>) -> Self {
        Self {
            backend,
            presign_expiry_secs: DEFAULT_PRESIGN_EXPIRY_SECS,
        }
    }

    pub fn with_presign_expiry(mut self, secs: u32) -> Self {
        self.presign_expiry_secs = secs;
        self
    }

    /// Build the backend selected by `STORAGE_PROVIDER`.
    pub fn from_config(config: &StorageConfig, public_url: &str) -> anyhow::Result<Self> {
        let backend: Arc<dyn ObjectStore> = match config.provider.as_str() {
            "s3" => {
                if config.s3_bucket.is_empty() {
                    anyhow::bail!("AWS_BUCKET_NAME must be set when STORAGE_PROVIDER=s3");
                }
                Arc::new(S3Client::new(config)?)
            }
            "memory" => Arc::new(MemoryStore::new(public_url)),
            other => anyhow::bail!("Unknown storage provider: {}", other),
        };

        info!(
            provider = %config.provider,
            bucket = backend.bucket(),
            "Storage backend initialized"
        );

        Ok(Self::new(backend).with_presign_expiry(config.presign_expiry_secs))
    }

    /// Store `payload` under `{destination}/{file_name}` and return that key.
    pub async fn upload_object(
        &self,
        payload: Bytes,
        file_name: &str,
        content_type: &str,
        destination: &str,
        mut metadata: HashMap<String, String>,
    ) -> StorageResult<String> {
        metadata.insert(CONTENT_TYPE_METADATA.to_string(), content_type.to_string());

        let object = StoredObject {
            key: object_key(destination, file_name),
            body: payload,
            content_type: content_type.to_string(),
            metadata,
        };

        match self.backend.put(&object).await {
            Ok(()) => {
                info!(key = %object.key, size = object.body.len(), "Object uploaded");
                Ok(object.key)
            }
            Err(e) => {
                error!(key = %object.key, error = %e, "Error uploading file");
                Err(StorageError::Upload(file_name.to_string()))
            }
        }
    }

    /// Delete without checking for existence first.
    pub async fn delete_object(&self, key: &str) -> StorageResult<()> {
        self.backend.delete(key).await.map_err(|e| {
            error!(key, error = %e, "Error deleting file");
            StorageError::Delete(key.to_string())
        })?;
        info!(key, "Object deleted");
        Ok(())
    }

    /// `Ok(false)` only when the backend says the object is missing; any
    /// other failure is returned as an error.
    pub async fn object_exists(&self, key: &str) -> StorageResult<bool> {
        match self.backend.head(key).await {
            Ok(()) => Ok(true),
            Err(BackendError::NotFound) => {
                debug!(key, "Object does not exist");
                Ok(false)
            }
            Err(e) => {
                error!(key, error = %e, "Existence check failed");
                Err(e.into())
            }
        }
    }

    pub async fn get_object_url(&self, key: &str) -> StorageResult<String> {
        if !self.object_exists(key).await? {
            return Err(StorageError::NotFound(key.to_string()));
        }

        let url = self
            .backend
            .presign_get(key, self.presign_expiry_secs)
            .await
            .map_err(|e| {
                error!(key, error = %e, "Failed to presign URL");
                StorageError::Backend(e)
            })?;
        debug!(key, expiry_secs = self.presign_expiry_secs, "Presigned URL issued");
        Ok(url)
    }

    pub async fn get_object_raw(&self, key: &str) -> StorageResult<Option<StoredObject>> {
        match self.backend.get(key).await {
            Ok(object) => Ok(Some(object)),
            Err(BackendError::NotFound) => Ok(None),
            Err(e) => {
                error!(key, error = %e, "Failed to fetch object");
                Err(e.into())
            }
        }
    }
}

pub fn object_key(destination: &str, file_name: &str) -> String {
    format!("{}/{}", destination, file_name)
}
