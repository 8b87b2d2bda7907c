//! `apikey` header check for the protected HTTP routes.

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub const API_KEY_HEADER: &str = "apikey";
pub const API_KEY_ERROR: &str = "API Key inválida o no proporcionada";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKeyStatus {
    /// No `apikey` header on the request.
    Missing,
    /// Header present but not equal to the configured key (or no key is configured).
    Invalid,
    Valid,
}

/// Constant-time string comparison.
fn safe_equal(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let diff = a
        .as_bytes()
        .iter()
        .zip(b.as_bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y));
    diff == 0
}

pub fn api_key_status(headers: &HeaderMap, expected: Option<&str>) -> ApiKeyStatus {
    let Some(value) = headers.get(API_KEY_HEADER) else {
        return ApiKeyStatus::Missing;
    };
    let provided = value.to_str().unwrap_or("");
    match expected {
        Some(key) if safe_equal(provided, key) => ApiKeyStatus::Valid,
        _ => ApiKeyStatus::Invalid,
    }
}

pub fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": API_KEY_ERROR })),
    )
        .into_response()
}
