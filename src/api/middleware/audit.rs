//! Access logging middleware.
//!
//! Logs every API request with a request id, method, path, response
//! status and latency. The request id is echoed as `X-Request-Id`.

use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let request_id = Uuid::new_v4();
    let start = std::time::Instant::now();

    let mut response = next.run(req).await;

    let status = response.status().as_u16();
    let elapsed_ms = start.elapsed().as_millis();
    if status >= 500 {
        tracing::warn!(%request_id, %method, %path, status, elapsed_ms = %elapsed_ms, "API request");
    } else {
        tracing::info!(%request_id, %method, %path, status, elapsed_ms = %elapsed_ms, "API request");
    }

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
