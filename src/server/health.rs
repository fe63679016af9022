//! Liveness endpoint.

use axum::http::StatusCode;

/// Returns 200 with the text "OK" while the server accepts connections.
pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}
