// Type definitions and the HTTP error taxonomy

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::str::FromStr;
use tracing::{error, warn};

use crate::storage::StorageError;
use crate::utils::response;

/// What a GET on a key should return, selected by the `type` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectType {
    /// A presigned read URL.
    #[default]
    Url,
    /// The stored bytes.
    Object,
    /// The bytes fetched through the presigned URL.
    Image,
}

impl FromStr for ObjectType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "url" => Ok(ObjectType::Url),
            "object" => Ok(ObjectType::Object),
            "image" => Ok(ObjectType::Image),
            other => Err(AppError::InvalidType(other.to_string())),
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectType::Url => write!(f, "url"),
            ObjectType::Object => write!(f, "object"),
            ObjectType::Image => write!(f, "image"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("Missing object key")]
    MissingKey,

    #[error("Object key is not valid UTF-8: {0}")]
    InvalidKey(String),

    #[error("Invalid type parameter: {0}")]
    InvalidType(String),

    #[error("Fetching presigned URL failed: {0}")]
    Fetch(#[from] reqwest::Error),
}

pub type AppResult<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Storage(StorageError::Upload(_))
            | Self::InvalidUpload(_)
            | Self::MissingKey
            | Self::InvalidKey(_) => StatusCode::BAD_REQUEST,
            Self::Storage(StorageError::NotFound(_)) | Self::InvalidType(_) => StatusCode::NOT_FOUND,
            Self::Storage(StorageError::Delete(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Storage(StorageError::Backend(_)) | Self::Fetch(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Text sent to the caller. Backend details never appear here.
    pub fn public_message(&self) -> String {
        match self {
            Self::Storage(StorageError::Upload(_)) | Self::InvalidUpload(_) => "Error uploading file".to_string(),
            Self::Storage(StorageError::Delete(_)) => "Error deleting file".to_string(),
            Self::Storage(e @ StorageError::NotFound(_)) => e.to_string(),
            Self::Storage(StorageError::Backend(_)) => "Storage backend error".to_string(),
            Self::MissingKey => "Missing object key".to_string(),
            Self::InvalidKey(_) => "Invalid object key".to_string(),
            Self::InvalidType(_) => "Invalid type parameter".to_string(),
            Self::Fetch(_) => "Error fetching object".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "Request rejected");
        }

        response::plain(status, self.public_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::BackendError;

    #[test]
    fn test_object_type_parsing() {
        assert_eq!("url".parse::<ObjectType>().unwrap(), ObjectType::Url);
        assert_eq!("object".parse::<ObjectType>().unwrap(), ObjectType::Object);
        assert_eq!("image".parse::<ObjectType>().unwrap(), ObjectType::Image);
        assert!(matches!("thumbnail".parse::<ObjectType>(), Err(AppError::InvalidType(t)) if t == "thumbnail"));
        assert_eq!(ObjectType::default(), ObjectType::Url);
    }

    #[test]
    fn test_error_mapping() {
        let cases = [
            (AppError::from(StorageError::Upload("a.jpg".into())), StatusCode::BAD_REQUEST, "Error uploading file"),
            (AppError::InvalidUpload("missing name".into()), StatusCode::BAD_REQUEST, "Error uploading file"),
            (AppError::from(StorageError::Delete("d/a.jpg".into())), StatusCode::INTERNAL_SERVER_ERROR, "Error deleting file"),
            (
                AppError::from(StorageError::NotFound("d/a.jpg".into())),
                StatusCode::NOT_FOUND,
                "Object with key 'd/a.jpg' does not exist.",
            ),
            (AppError::InvalidType("x".into()), StatusCode::NOT_FOUND, "Invalid type parameter"),
            (AppError::MissingKey, StatusCode::BAD_REQUEST, "Missing object key"),
            (AppError::InvalidKey("%FF".into()), StatusCode::BAD_REQUEST, "Invalid object key"),
        ];

        for (err, status, message) in cases {
            assert_eq!(err.status_code(), status);
            assert_eq!(err.public_message(), message);
        }
    }

    #[test]
    fn test_backend_details_are_not_rendered() {
        let err = AppError::from(StorageError::Backend(BackendError::Other(
            "AccessDenied: key AKIDEXAMPLE".to_string(),
        )));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert!(!err.public_message().contains("AKIDEXAMPLE"));
    }
}
