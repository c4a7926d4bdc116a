//! # HTTP Response
//!
//! Response value type mutated in place or replaced by response
//! middleware; the final response is handed to the transport layer for
//! serialization.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::StatusCode;
use std::collections::HashMap;

/// An HTTP response under construction
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Content type
    pub content_type: String,
    /// Response headers (excluding Content-Type)
    pub headers: HashMap<String, String>,
    /// Response body
    pub body: String,
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .finish()
    }
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: 200,
            content_type: "application/json".to_string(),
            headers: HashMap::new(),
            body: String::new(),
        }
    }
}

impl Response {
    /// Create a JSON response
    #[must_use]
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: "application/json".to_string(),
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Create a plain text response
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: "text/plain".to_string(),
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Create an HTML response
    #[must_use]
    pub fn html(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: "text/html".to_string(),
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Create an empty response with the given status code
    #[must_use]
    pub fn status(status: u16) -> Self {
        Self {
            status,
            content_type: "text/plain".to_string(),
            headers: HashMap::new(),
            body: String::new(),
        }
    }

    /// Create a redirect to the given location
    #[must_use]
    pub fn redirect(location: impl Into<String>) -> Self {
        let mut headers = HashMap::new();
        headers.insert("Location".to_string(), location.into());
        Self {
            status: 302,
            content_type: "text/html".to_string(),
            headers,
            body: String::new(),
        }
    }

    /// Set the status code
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Set a header (Content-Type is routed to the dedicated field)
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.set_header(key, value);
        self
    }

    /// Set or override a header
    pub fn set_header(&mut self, key: &str, value: &str) {
        if key.eq_ignore_ascii_case("content-type") {
            self.content_type = value.to_string();
        } else {
            self.headers.insert(key.to_string(), value.to_string());
        }
    }

    /// Get a header value (case-sensitive on the stored name)
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    /// Convert to a hyper response for the transport layer
    #[must_use]
    pub(crate) fn into_hyper(self) -> hyper::Response<Full<Bytes>> {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut builder = hyper::Response::builder().status(status);
        builder = builder.header("Content-Type", &self.content_type);
        for (k, v) in &self.headers {
            builder = builder.header(k.as_str(), v.as_str());
        }

        builder
            .body(Full::new(Bytes::from(self.body)))
            .unwrap_or_else(|_| {
                hyper::Response::builder()
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .body(Full::new(Bytes::from("Internal Server Error")))
                    .unwrap()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_response() {
        let resp = Response::json(r#"{"status": "ok"}"#);
        assert_eq!(resp.status, 200);
        assert_eq!(resp.content_type, "application/json");
    }

    #[test]
    fn test_with_status() {
        let resp = Response::text("Not Found").with_status(404);
        assert_eq!(resp.status, 404);
        assert_eq!(resp.body, "Not Found");
    }

    #[test]
    fn test_content_type_header_routed() {
        let resp = Response::text("x").with_header("Content-Type", "text/csv");
        assert_eq!(resp.content_type, "text/csv");
        assert!(resp.headers.is_empty());
    }

    #[test]
    fn test_redirect() {
        let resp = Response::redirect("/login");
        assert_eq!(resp.status, 302);
        assert_eq!(resp.header("Location"), Some("/login"));
    }

    #[test]
    fn test_default_is_empty_200() {
        let resp = Response::default();
        assert_eq!(resp.status, 200);
        assert!(resp.body.is_empty());
    }
}
