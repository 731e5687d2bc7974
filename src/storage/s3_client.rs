// S3 backend built on rust-s3

use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue};
use bytes::Bytes;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::region::Region;
use s3::Bucket;
use std::collections::HashMap;
use tracing::warn;

use super::{BackendError, ObjectStore, StoredObject};
use crate::config::StorageConfig;

const METADATA_HEADER_PREFIX: &str = "x-amz-meta-";

pub struct S3Client {
    bucket: Bucket,
}

impl S3Client {
    pub fn new(config: &StorageConfig) -> anyhow::Result<Self> {
        let region = match &config.s3_endpoint {
            Some(endpoint) => Region::Custom {
                region: config.s3_region.clone(),
                endpoint: endpoint.clone(),
            },
            None => config.s3_region.parse()?,
        };

        // Missing keys fall back to the provider chain (env, profile, instance role).
        let credentials = Credentials::new(
            config.s3_access_key_id.as_deref(),
            config.s3_secret_access_key.as_deref(),
            None,
            None,
            None,
        )?;

        let mut bucket = Bucket::new(&config.s3_bucket, region, credentials)?;
        if config.s3_path_style {
            bucket = bucket.with_path_style();
        }

        Ok(Self { bucket })
    }
}

fn backend_error(e: S3Error) -> BackendError {
    match e {
        S3Error::HttpFailWithBody(404, _) => BackendError::NotFound,
        other => BackendError::Other(other.to_string()),
    }
}

fn check_status(status: u16) -> Result<(), BackendError> {
    match status {
        200..=299 => Ok(()),
        404 => Err(BackendError::NotFound),
        other => Err(BackendError::Other(format!("unexpected status {}", other))),
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    fn bucket(&self) -> &str {
        &self.bucket.name
    }

    async fn put(&self, object: &StoredObject) -> Result<(), BackendError> {
        // Metadata travels as x-amz-meta-* headers on a per-request copy of the bucket.
        let mut bucket = self.bucket.clone();
        for (name, value) in &object.metadata {
            let header = format!("{}{}", METADATA_HEADER_PREFIX, name.to_ascii_lowercase());
            if HeaderName::from_bytes(header.as_bytes()).is_err() || HeaderValue::from_str(value).is_err() {
                warn!(key = %object.key, metadata = %name, "Skipping metadata entry that is not a valid header");
                continue;
            }
            bucket.add_header(&header, value);
        }

        let response = bucket
            .put_object_with_content_type(&object.key, &object.body, &object.content_type)
            .await
            .map_err(backend_error)?;
        check_status(response.status_code())
    }

    async fn head(&self, key: &str) -> Result<(), BackendError> {
        let (_, status) = self.bucket.head_object(key).await.map_err(backend_error)?;
        check_status(status)
    }

    async fn get(&self, key: &str) -> Result<StoredObject, BackendError> {
        let response = self.bucket.get_object(key).await.map_err(backend_error)?;
        check_status(response.status_code())?;

        let headers = response.headers();
        let content_type = headers
            .get("content-type")
            .cloned()
            .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string());
        let metadata: HashMap<String, String> = headers
            .iter()
            .filter_map(|(name, value)| {
                name.to_ascii_lowercase()
                    .strip_prefix(METADATA_HEADER_PREFIX)
                    .map(|meta| (meta.to_string(), value.clone()))
            })
            .collect();

        Ok(StoredObject {
            key: key.to_string(),
            body: Bytes::copy_from_slice(response.bytes()),
            content_type,
            metadata,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        let response = self.bucket.delete_object(key).await.map_err(backend_error)?;
        match check_status(response.status_code()) {
            // S3 answers 204 for deletes, including keys that never existed.
            Err(BackendError::NotFound) => Ok(()),
            other => other,
        }
    }

    async fn presign_get(&self, key: &str, expiry_secs: u32) -> Result<String, BackendError> {
        self.bucket
            .presign_get(key, expiry_secs, None)
            .await
            .map_err(backend_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Storage, StorageError};
    use mockito::Matcher;
    use std::sync::Arc;

    fn config() -> StorageConfig {
        config_with_endpoint("http://127.0.0.1:9000")
    }

    fn config_with_endpoint(endpoint: &str) -> StorageConfig {
        StorageConfig {
            provider: "s3".to_string(),
            s3_bucket: "uploads".to_string(),
            s3_region: "eu-west-1".to_string(),
            s3_access_key_id: Some("AKIDEXAMPLE".to_string()),
            s3_secret_access_key: Some("wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string()),
            s3_endpoint: Some(endpoint.to_string()),
            s3_path_style: true,
            presign_expiry_secs: 300,
        }
    }

    #[test]
    fn test_status_classification() {
        assert!(check_status(200).is_ok());
        assert!(check_status(204).is_ok());
        assert!(matches!(check_status(404), Err(BackendError::NotFound)));
        assert!(matches!(check_status(503), Err(BackendError::Other(_))));
    }

    #[test]
    fn test_not_found_error_mapping() {
        assert!(matches!(
            backend_error(S3Error::HttpFailWithBody(404, String::new())),
            BackendError::NotFound
        ));
        assert!(matches!(
            backend_error(S3Error::HttpFailWithBody(500, "InternalError".to_string())),
            BackendError::Other(_)
        ));
    }

    #[test]
    fn test_client_binds_bucket() {
        let client = S3Client::new(&config()).unwrap();
        assert_eq!(client.bucket(), "uploads");
    }

    #[tokio::test]
    async fn test_presign_is_local() {
        let client = S3Client::new(&config()).unwrap();
        let url = client.presign_get("photos/cat.jpg", 300).await.unwrap();

        assert!(url.starts_with("http://127.0.0.1:9000/"));
        assert!(url.contains("/uploads/photos/cat.jpg?"));
        assert!(url.contains("X-Amz-Expires=300"));
        assert!(url.contains("X-Amz-Signature="));
    }

    #[tokio::test]
    async fn test_storage_classifies_s3_responses() {
        let mut server = mockito::Server::new_async().await;
        let _head = server
            .mock("HEAD", "/uploads/photos/missing.png")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;
        let _get = server
            .mock("GET", "/uploads/photos/missing.png")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body("<Error><Code>NoSuchKey</Code></Error>")
            .create_async()
            .await;
        let _delete = server
            .mock("DELETE", "/uploads/photos/missing.png")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("<Error><Code>InternalError</Code></Error>")
            .create_async()
            .await;

        let client = S3Client::new(&config_with_endpoint(&server.url())).unwrap();
        let storage = Storage::new(Arc::new(client));

        assert!(!storage.object_exists("photos/missing.png").await.unwrap());
        assert!(storage.get_object_raw("photos/missing.png").await.unwrap().is_none());
        assert!(matches!(
            storage.get_object_url("photos/missing.png").await,
            Err(StorageError::NotFound(key)) if key == "photos/missing.png"
        ));
        assert!(matches!(
            storage.delete_object("photos/missing.png").await,
            Err(StorageError::Delete(_))
        ));
    }
}
