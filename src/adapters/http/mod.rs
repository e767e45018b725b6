pub mod error;
pub mod routes;
pub mod state;

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};

use crate::adapters::http::state::HttpState;

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(routes::root))
        .route("/ready", get(routes::readiness))
        .route("/detect/image", post(routes::detect_image))
        .with_state(state)
}

/// Upload cap for the multipart extractor; `None` lifts axum's 2 MB default.
pub fn upload_limit(max_bytes: Option<usize>) -> DefaultBodyLimit {
    match max_bytes {
        Some(bytes) => DefaultBodyLimit::max(bytes),
        None => DefaultBodyLimit::disable(),
    }
}

/// Credentialed CORS for the listed origins. A `*` entry opens it to any
/// origin without credentials.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let origins: Vec<&str> = origins.iter().map(|o| o.trim()).filter(|o| !o.is_empty()).collect();

    if origins.contains(&"*") {
        return Ok(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));
    }

    let allowed = origins
        .iter()
        .map(|o| HeaderValue::from_str(o).with_context(|| format!("invalid CORS origin '{}'", o)))
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request()))
}
