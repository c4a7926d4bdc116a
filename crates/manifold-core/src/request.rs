//! # HTTP Request
//!
//! Request wrapper owned by a single dispatch call. Route parameters are
//! bound exactly once, after a successful match and before any middleware
//! or the handler runs; the free-form context map carries values between
//! middleware (request id, auth principal, ...).

use crate::error::{Error, Result};
use http_body_util::BodyExt;
use hyper::body::Bytes;
use std::collections::HashMap;

/// HTTP methods supported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// HTTP GET
    Get,
    /// HTTP POST
    Post,
    /// HTTP PUT
    Put,
    /// HTTP DELETE
    Delete,
    /// HTTP PATCH
    Patch,
}

impl Method {
    /// Map from the transport's method type
    ///
    /// Returns `None` for methods the engine does not route.
    #[must_use]
    pub fn from_hyper(method: &hyper::Method) -> Option<Self> {
        match *method {
            hyper::Method::GET => Some(Self::Get),
            hyper::Method::POST => Some(Self::Post),
            hyper::Method::PUT => Some(Self::Put),
            hyper::Method::DELETE => Some(Self::Delete),
            hyper::Method::PATCH => Some(Self::Patch),
            _ => None,
        }
    }

    /// Canonical uppercase name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed HTTP request
///
/// Owned exclusively by one dispatch call; all derived data is released
/// when the response is sent.
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method
    pub method: Method,
    /// Request path (without query string)
    pub path: String,
    /// Raw query string (e.g., "page=1&limit=10")
    query_string: Option<String>,
    /// Parsed query parameters
    query_params: HashMap<String, String>,
    /// Route parameters, bound by the dispatcher after a successful match
    params: HashMap<String, String>,
    /// Request headers
    headers: hyper::HeaderMap,
    /// Request body (collected)
    body: Option<Bytes>,
    /// Cross-middleware context values
    context: HashMap<String, String>,
}

impl Request {
    /// Create a request manually (tests and embedding hosts)
    #[must_use]
    pub fn new(
        method: Method,
        path: String,
        headers_map: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> Self {
        let (path, query_string) = if let Some((p, q)) = path.split_once('?') {
            (p.to_string(), Some(q.to_string()))
        } else {
            (path, None)
        };

        let query_params = parse_query_string(query_string.as_deref());

        let mut headers = hyper::HeaderMap::new();
        for (k, v) in headers_map {
            if let (Ok(name), Ok(value)) = (
                hyper::header::HeaderName::from_bytes(k.as_bytes()),
                hyper::header::HeaderValue::from_str(&v),
            ) {
                headers.insert(name, value);
            }
        }

        Self {
            method,
            path,
            query_string,
            query_params,
            params: HashMap::new(),
            headers,
            body,
            context: HashMap::new(),
        }
    }

    /// Create from a hyper request, enforcing a body size limit
    ///
    /// # Errors
    ///
    /// [`Error::MethodNotSupported`] for methods outside the routed set,
    /// [`Error::PayloadTooLarge`] when the body exceeds `max_body_size`.
    pub async fn from_hyper_with_limit(
        req: hyper::Request<hyper::body::Incoming>,
        max_body_size: usize,
    ) -> Result<Self> {
        let Some(method) = Method::from_hyper(req.method()) else {
            return Err(Error::MethodNotSupported {
                method: req.method().to_string(),
            });
        };

        let uri = req.uri();
        let path = uri.path().to_string();
        let query_string = uri.query().map(String::from);
        let query_params = parse_query_string(query_string.as_deref());
        let headers = req.headers().clone();

        if let Some(len) = headers.get(hyper::header::CONTENT_LENGTH) {
            if let Some(content_len) = len.to_str().ok().and_then(|s| s.parse::<usize>().ok()) {
                if content_len > max_body_size {
                    return Err(Error::PayloadTooLarge {
                        limit: max_body_size,
                        actual: content_len,
                    });
                }
            }
        }

        let body = match BodyExt::collect(req.into_body()).await {
            Ok(collected) => {
                let bytes = collected.to_bytes();
                if bytes.len() > max_body_size {
                    return Err(Error::PayloadTooLarge {
                        limit: max_body_size,
                        actual: bytes.len(),
                    });
                }
                Some(bytes)
            }
            Err(_) => None,
        };

        Ok(Self {
            method,
            path,
            query_string,
            query_params,
            params: HashMap::new(),
            headers,
            body,
            context: HashMap::new(),
        })
    }

    /// Get a header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Set or override a header
    pub fn set_header(&mut self, name: &str, value: &str) {
        if let (Ok(n), Ok(v)) = (
            hyper::header::HeaderName::from_bytes(name.as_bytes()),
            hyper::header::HeaderValue::from_str(value),
        ) {
            self.headers.insert(n, v);
        }
    }

    /// Get a route parameter bound by the matcher
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// All route parameters
    #[must_use]
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// Bind route parameters after a successful match
    ///
    /// Called once per request by the dispatcher.
    pub(crate) fn bind_params(&mut self, params: HashMap<String, String>) {
        debug_assert!(self.params.is_empty(), "route parameters bound twice");
        self.params = params;
    }

    /// Get a query parameter
    #[must_use]
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(String::as_str)
    }

    /// All query parameters
    #[must_use]
    pub fn query_map(&self) -> &HashMap<String, String> {
        &self.query_params
    }

    /// Raw query string
    #[must_use]
    pub fn query_string(&self) -> Option<&str> {
        self.query_string.as_deref()
    }

    /// Request body as bytes
    #[must_use]
    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_ref().map(|b| b.as_ref())
    }

    /// Request body as UTF-8 text
    #[must_use]
    pub fn body_str(&self) -> Option<&str> {
        self.body_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Store a context value for later middleware or the handler
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.context.insert(key.into(), value.into());
    }

    /// Get a context value
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.context.get(key).map(String::as_str)
    }
}

/// Parse a query string into a map
///
/// Handles URL decoding and duplicate keys (last value wins).
fn parse_query_string(query: Option<&str>) -> HashMap<String, String> {
    query
        .map(|q| {
            q.split('&')
                .filter_map(|pair| {
                    let mut parts = pair.splitn(2, '=');
                    let key = parts.next()?;
                    let value = parts.next().unwrap_or("");
                    Some((url_decode(key), url_decode(value)))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Basic URL decoding
fn url_decode(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '+' => result.push(' '),
            '%' => {
                let hex: String = chars.by_ref().take(2).collect();
                if hex.len() == 2 {
                    if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                        result.push(byte as char);
                    } else {
                        result.push('%');
                        result.push_str(&hex);
                    }
                } else {
                    result.push('%');
                    result.push_str(&hex);
                }
            }
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(path: &str) -> Request {
        Request::new(Method::Get, path.to_string(), HashMap::new(), None)
    }

    #[test]
    fn test_query_string_split_from_path() {
        let req = request("/search?q=manifold&page=2");
        assert_eq!(req.path, "/search");
        assert_eq!(req.query("q"), Some("manifold"));
        assert_eq!(req.query("page"), Some("2"));
        assert_eq!(req.query_string(), Some("q=manifold&page=2"));
    }

    #[test]
    fn test_header_case_insensitive() {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        let req = Request::new(Method::Post, "/".to_string(), headers, None);
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.header("CONTENT-TYPE"), Some("application/json"));
    }

    #[test]
    fn test_context_round_trip() {
        let mut req = request("/");
        assert_eq!(req.get("principal"), None);
        req.set("principal", "alice");
        assert_eq!(req.get("principal"), Some("alice"));
    }

    #[test]
    fn test_bind_params_once() {
        let mut req = request("/users/7");
        let mut params = HashMap::new();
        params.insert("id".to_string(), "7".to_string());
        req.bind_params(params);
        assert_eq!(req.param("id"), Some("7"));
        assert_eq!(req.param("missing"), None);
    }

    #[test]
    fn test_body_str() {
        let req = Request::new(
            Method::Post,
            "/".to_string(),
            HashMap::new(),
            Some(Bytes::from_static(b"{\"ok\":true}")),
        );
        assert_eq!(req.body_str(), Some("{\"ok\":true}"));
    }

    #[test]
    fn test_parse_query_string_url_encoded() {
        let result = parse_query_string(Some("name=John+Doe&city=New%20York"));
        assert_eq!(result.get("name"), Some(&"John Doe".to_string()));
        assert_eq!(result.get("city"), Some(&"New York".to_string()));
    }

    #[test]
    fn test_url_decode() {
        assert_eq!(url_decode("hello+world"), "hello world");
        assert_eq!(url_decode("hello%20world"), "hello world");
        assert_eq!(url_decode("100%25"), "100%");
    }

    #[test]
    fn test_method_from_hyper() {
        assert_eq!(Method::from_hyper(&hyper::Method::GET), Some(Method::Get));
        assert_eq!(Method::from_hyper(&hyper::Method::PATCH), Some(Method::Patch));
        assert_eq!(Method::from_hyper(&hyper::Method::OPTIONS), None);
    }
}
