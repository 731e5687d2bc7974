// CORS configuration
// Preflight answers are built in the OPTIONS handler; this layer only stamps
// the allow-origin header onto every response, framework rejections included.

use axum::http::{header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

pub fn apply_cors(router: Router) -> Router {
    router.layer(SetResponseHeaderLayer::overriding(
        ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    ))
}
