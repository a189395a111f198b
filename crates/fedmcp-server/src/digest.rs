//! Request body digest middleware.
//!
//! Buffers the request body, hashes it and echoes the hex SHA-256 back in the
//! `X-Content-SHA256` response header.

use axum::body::Body;
use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use fedmcp_core::sha256_hex;

use crate::error::AppError;

pub const CONTENT_SHA256_HEADER: &str = "x-content-sha256";

/// Largest request body accepted.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

pub async fn content_digest(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return AppError::PayloadTooLarge(format!(
                "Request body must be at most {} bytes",
                MAX_BODY_BYTES
            ))
            .into_response()
        }
    };

    let digest = sha256_hex(&bytes);
    let mut response = next.run(Request::from_parts(parts, Body::from(bytes))).await;
    if let Ok(value) = HeaderValue::from_str(&digest) {
        response.headers_mut().insert(CONTENT_SHA256_HEADER, value);
    }
    response
}
