//! Object routes
//!
//! One method router is mounted on `/` and `/{*key}`; the handler is picked by
//! HTTP method and, for GET, by the `type` query parameter.

use axum::{
    body::Body,
    extract::{
        multipart::MultipartRejection, rejection::QueryRejection, FromRequestParts, Multipart, Query,
        State,
    },
    http::{request::Parts, Method, StatusCode, Uri},
    response::Response,
    routing::{get, MethodRouter},
    Router,
};
use bytes::Bytes;
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::models::AppState;
use crate::storage::StorageError;
use crate::types::{AppError, AppResult, ObjectType};
use crate::utils::response;

/// Content type assumed for uploads that carry none.
const DEFAULT_UPLOAD_CONTENT_TYPE: &str = "image/jpeg";

pub fn router(state: AppState) -> Router {
    // axum answers HEAD with the GET handler unless HEAD has its own route.
    let methods: MethodRouter<AppState> = get(get_object)
        .head(method_not_allowed)
        .post(upload_object)
        .delete(delete_object)
        .options(preflight)
        .fallback(method_not_allowed);

    Router::new()
        .route("/", methods.clone())
        .route("/{*key}", methods)
        .with_state(state)
}

/// Object key taken from the request path, without the leading `/`.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectKey(pub String);

impl ObjectKey {
    fn require(self) -> AppResult<String> {
        if self.0.is_empty() {
            Err(AppError::MissingKey)
        } else {
            Ok(self.0)
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for ObjectKey {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let path = parts.uri.path();
        let raw = path.strip_prefix('/').unwrap_or(path);
        let key = percent_decode_str(raw)
            .decode_utf8()
            .map_err(|_| AppError::InvalidKey(raw.to_string()))?;
        Ok(ObjectKey(key.into_owned()))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ObjectQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl ObjectQuery {
    fn object_type(&self) -> AppResult<ObjectType> {
        match self.kind.as_deref().filter(|t| !t.is_empty()) {
            Some(kind) => kind.parse(),
            None => Ok(ObjectType::default()),
        }
    }
}

/// GET /{key}
async fn get_object(
    State(state): State<AppState>,
    key: ObjectKey,
    query: Result<Query<ObjectQuery>, QueryRejection>,
) -> AppResult<Response> {
    let Query(query) = query.map_err(|e| AppError::InvalidType(e.body_text()))?;
    let kind = query.object_type()?;
    let key = key.require()?;
    debug!(key = %key, kind = %kind, "Object requested");

    match kind {
        ObjectType::Object => {
            let object = state
                .storage
                .get_object_raw(&key)
                .await?
                .ok_or_else(|| StorageError::NotFound(key.clone()))?;
            Ok(response::object(object))
        }
        ObjectType::Url => {
            let url = state.storage.get_object_url(&key).await?;
            Ok(response::plain(StatusCode::OK, url))
        }
        ObjectType::Image => {
            let url = state.storage.get_object_url(&key).await?;
            let upstream = state.http.get(&url).send().await?.error_for_status()?;
            let content_type = upstream
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);

            Ok(response::bytes(
                StatusCode::OK,
                content_type.as_deref(),
                Body::from_stream(upstream.bytes_stream()),
            ))
        }
    }
}

/// Fields of an upload form.
#[derive(Debug)]
struct UploadForm {
    image: Bytes,
    content_type: String,
    name: String,
    destination: String,
    /// Any other text fields; stored as object metadata.
    metadata: HashMap<String, String>,
}

impl UploadForm {
    async fn from_multipart(mut multipart: Multipart) -> AppResult<Self> {
        let mut image = None;
        let mut part_content_type = None;
        let mut name = None;
        let mut destination = None;
        let mut metadata = HashMap::new();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::InvalidUpload(e.to_string()))?
        {
            let field_name = field.name().unwrap_or_default().to_string();
            match field_name.as_str() {
                "image" => {
                    part_content_type = field.content_type().map(str::to_owned);
                    image = Some(
                        field
                            .bytes()
                            .await
                            .map_err(|e| AppError::InvalidUpload(e.to_string()))?,
                    );
                }
                _ => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| AppError::InvalidUpload(e.to_string()))?;
                    match field_name.as_str() {
                        "name" => name = Some(text),
                        "destination" => destination = Some(text),
                        "" => {}
                        _ => {
                            metadata.insert(field_name, text);
                        }
                    }
                }
            }
        }

        let image = image.ok_or_else(|| AppError::InvalidUpload("missing field 'image'".into()))?;
        let name = name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| AppError::InvalidUpload("missing field 'name'".into()))?;
        let destination = destination
            .filter(|d| !d.is_empty())
            .ok_or_else(|| AppError::InvalidUpload("missing field 'destination'".into()))?;

        // Browsers send octet-stream when they don't know; the file name is a better guess then.
        let content_type = part_content_type
            .filter(|ct| ct != mime::APPLICATION_OCTET_STREAM.as_ref())
            .or_else(|| mime_guess::from_path(&name).first_raw().map(str::to_owned))
            .unwrap_or_else(|| DEFAULT_UPLOAD_CONTENT_TYPE.to_string());

        Ok(Self { image, content_type, name, destination, metadata })
    }
}

/// POST / - multipart upload
async fn upload_object(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Response> {
    let multipart = multipart.map_err(|e| AppError::InvalidUpload(e.body_text()))?;
    let form = UploadForm::from_multipart(multipart).await?;

    let key = state
        .storage
        .upload_object(form.image, &form.name, &form.content_type, &form.destination, form.metadata)
        .await?;
    info!(key = %key, content_type = %form.content_type, "File uploaded");

    Ok(response::plain(StatusCode::OK, "File uploaded successfully"))
}

/// DELETE /{key}
async fn delete_object(State(state): State<AppState>, key: ObjectKey) -> AppResult<Response> {
    let key = key.require()?;
    state.storage.delete_object(&key).await?;
    Ok(response::plain(StatusCode::OK, "true"))
}

/// OPTIONS /{key}
async fn preflight() -> Response {
    response::preflight()
}

async fn method_not_allowed(method: Method, uri: Uri) -> Response {
    debug!(%method, path = uri.path(), "Method not allowed");
    response::method_not_allowed()
}
