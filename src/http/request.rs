//! Request handling.
//!
//! # Responsibilities
//! - Buffer the inbound request into an owned, read-only value
//! - Extract diagnostic fields (host, locale, query parameters)
//! - Carry the request ID assigned by the middleware stack
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Body size limits enforced by middleware before the body is read

use axum::body::Bytes;
use axum::http::{header, request::Parts, HeaderMap, HeaderName, Method, Uri};

/// Header carrying the request ID.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Header fallback for the locale tag.
pub const X_LOCALE: HeaderName = HeaderName::from_static("x-gateway-locale");

/// A fully buffered inbound request.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
}

impl GatewayRequest {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            uri,
            headers,
            body,
        }
    }

    pub fn from_parts(parts: Parts, body: Bytes) -> Self {
        Self::new(parts.method, parts.uri, parts.headers, body)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Header value as text; non-UTF-8 values are treated as absent.
    pub fn header(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn request_id(&self) -> &str {
        self.header(&X_REQUEST_ID).unwrap_or("unknown")
    }

    /// First value of a query-string parameter.
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// Host the client addressed, without port.
    pub fn hostname(&self) -> String {
        let host = self
            .header(header::HOST)
            .or_else(|| self.uri.host())
            .unwrap_or_default();
        strip_port(host).to_string()
    }

    /// Locale from the `locale` parameter, then the locale header, else empty.
    pub fn locale(&self) -> String {
        self.query_param("locale")
            .or_else(|| self.header(&X_LOCALE).map(str::to_string))
            .unwrap_or_default()
    }
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        // IPv6 literal: keep through the closing bracket.
        return host.split_once(']').map(|(h, _)| &host[..h.len() + 1]).unwrap_or(host);
    }
    host.rsplit_once(':').map(|(h, _)| h).unwrap_or(host)
}
