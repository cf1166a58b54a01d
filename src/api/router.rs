//! API router.
//!
//! Returns a composable `Router` with every endpoint under `/api/`.
//!
//! Layers (outermost → innermost):
//! 1. CORS → 2. Security headers → 3. Body limit → 4. Access log

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;

/// Base64 images are about 4/3 of the decoded size limit.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

const SECURITY_HEADERS: [(HeaderName, &str); 4] = [
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::X_FRAME_OPTIONS, "DENY"),
    (header::REFERRER_POLICY, "strict-origin-when-cross-origin"),
    (header::CACHE_CONTROL, "no-store"),
];

/// Build the API router around a prepared context.
pub fn api_router(ctx: ApiContext) -> Router {
    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/analyze", post(endpoints::analysis::analyze))
        .route("/analyze/background", post(endpoints::analysis::submit))
        .route("/analysis", get(endpoints::analysis::poll))
        .route("/ocr", post(endpoints::ocr::extract))
        .with_state(ctx);

    let mut router = Router::new()
        .nest("/api", api)
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES));

    for (name, value) in SECURITY_HEADERS {
        router = router.layer(SetResponseHeaderLayer::overriding(
            name,
            HeaderValue::from_static(value),
        ));
    }

    router.layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE]),
    )
}
