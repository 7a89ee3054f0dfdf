//! Typed request-scoped context.

/// Header carrying the request id on inbound HTTP requests.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Values a request carries through the call chain that the logger cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_id(request_id: impl Into<String>) -> Self {
        Self {
            request_id: Some(request_id.into()),
        }
    }

    /// Builds a context from an HTTP header map.
    pub fn from_headers(headers: &axum::http::HeaderMap) -> Self {
        let request_id = headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        Self { request_id }
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    #[test]
    fn reads_request_id_header() {
        let mut headers = HeaderMap::new();
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("abc"));
        assert_eq!(RequestContext::from_headers(&headers).request_id(), Some("abc"));
    }

    #[test]
    fn missing_or_empty_header_yields_none() {
        assert_eq!(RequestContext::from_headers(&HeaderMap::new()).request_id(), None);

        let mut headers = HeaderMap::new();
        headers.insert(X_REQUEST_ID, HeaderValue::from_static(""));
        assert_eq!(RequestContext::from_headers(&headers).request_id(), None);
    }
}
