//! Response construction.
//!
//! # Responsibilities
//! - Static asset responses with long-lived caching headers
//! - The JSON error body for failed dynamic requests
//!
//! # Design Decisions
//! - Error bodies outside development mode carry only a generic message,
//!   the code and the server version
//! - Every failure maps to 500 for the client

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::assets::StaticAsset;
use crate::dispatch::Failure;

/// Format a timestamp as an HTTP date (RFC 1123, GMT).
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Serve a cached asset with public caching for `max_age_secs`.
pub fn static_response(asset: &StaticAsset, max_age_secs: u64) -> Response {
    let expires = i64::try_from(max_age_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|max_age| Utc::now().checked_add_signed(max_age))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);

    let mut response = Response::new(Body::from(asset.body.clone()));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(asset.mime));
    if let Ok(value) = HeaderValue::from_str(&format!("public, max-age={}", max_age_secs)) {
        headers.insert(header::CACHE_CONTROL, value);
    }
    if let Ok(value) = HeaderValue::from_str(&http_date(expires)) {
        headers.insert(header::EXPIRES, value);
    }
    response
}

/// JSON body of a 500 response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
    pub version: String,
}

impl ErrorBody {
    pub fn from_failure(failure: &Failure, development: bool, version: &str) -> Self {
        if development {
            Self {
                message: format!("Error: {}", failure.message()),
                code: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                file: Some(failure.file().to_string()),
                line: Some(failure.line()),
                trace: Some(failure.trace().to_string()),
                version: version.to_string(),
            }
        } else {
            Self {
                message: "Error: Server Error".to_string(),
                code: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                file: None,
                line: None,
                trace: None,
                version: version.to_string(),
            }
        }
    }
}

/// The client-visible response for a failed dynamic request.
pub fn error_response(failure: &Failure, development: bool, version: &str) -> Response {
    let body = ErrorBody::from_failure(failure, development, version);
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}
