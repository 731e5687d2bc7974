//! Response builders
//!
//! Every handler renders through these helpers so status, content type and
//! CORS headers stay uniform.

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;

use crate::storage::StoredObject;

pub const PREFLIGHT_ALLOW_METHODS: &str = "GET, POST, PUT, DELETE";
pub const PREFLIGHT_ALLOW_HEADERS: &str = "Content-Type";
pub const PREFLIGHT_MAX_AGE_SECS: &str = "86400";
pub const ALLOW_METHODS: &str = "PUT, POST, GET, DELETE, HEAD";

fn builder(status: StatusCode) -> axum::http::response::Builder {
    Response::builder()
        .status(status)
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
}

fn finish(builder: axum::http::response::Builder, body: Body) -> Response {
    // The builder only fails on invalid header input, which the callers
    // never produce. Fall back to a bare 500 rather than panicking.
    builder.body(body).unwrap_or_else(|_| {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    })
}

/// `text/plain` response.
pub fn plain(status: StatusCode, body: impl Into<Body>) -> Response {
    finish(
        builder(status).header(header::CONTENT_TYPE, mime::TEXT_PLAIN.as_ref()),
        body.into(),
    )
}

/// Response carrying `body` with the given content type, if any.
pub fn bytes(status: StatusCode, content_type: Option<&str>, body: Body) -> Response {
    let mut builder = builder(status);
    if let Some(value) = content_type.and_then(|ct| HeaderValue::from_str(ct).ok()) {
        builder = builder.header(header::CONTENT_TYPE, value);
    }
    finish(builder, body)
}

pub fn object(object: StoredObject) -> Response {
    bytes(StatusCode::OK, Some(&object.content_type), Body::from(object.body))
}

/// Answer to OPTIONS: empty 200 with the preflight headers.
pub fn preflight() -> Response {
    finish(
        builder(StatusCode::OK)
            .header(header::ACCESS_CONTROL_ALLOW_METHODS, PREFLIGHT_ALLOW_METHODS)
            .header(header::ACCESS_CONTROL_ALLOW_HEADERS, PREFLIGHT_ALLOW_HEADERS)
            .header(header::ACCESS_CONTROL_MAX_AGE, PREFLIGHT_MAX_AGE_SECS),
        Body::empty(),
    )
}

pub fn method_not_allowed() -> Response {
    finish(
        builder(StatusCode::METHOD_NOT_ALLOWED)
            .header(header::ALLOW, ALLOW_METHODS)
            .header(header::CONTENT_TYPE, mime::TEXT_PLAIN.as_ref()),
        Body::from("Method Not Allowed"),
    )
}
