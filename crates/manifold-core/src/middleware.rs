//! # Middleware Pipeline
//!
//! Ordered pre-request filters and response post-processors.
//!
//! Pre-request hooks run in registration order and may short-circuit the
//! pipeline with an early response; when one aborts, the handler, the
//! remaining pre-request hooks and all response hooks are skipped and the
//! attached response is sent as-is. Response hooks also run in
//! registration order, each receiving ownership of the current response
//! and returning the (possibly replaced) one.
//!
//! The pipeline imposes no per-request locking; middleware owning shared
//! state (rate-limiter buckets, timing tables) must synchronize it
//! internally.

use crate::request::Request;
use crate::response::Response;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Result of a pre-request hook
#[derive(Debug)]
pub enum Outcome {
    /// Continue to the next hook or the handler
    Proceed,
    /// Short-circuit with this response (skip handler and remaining hooks)
    Abort(Response),
}

/// Request/response interception
///
/// Both hooks default to pass-through so a middleware may implement
/// either side only.
pub trait Middleware: Send + Sync {
    /// Called before the handler; may abort with an early response
    fn before(&self, _req: &mut Request) -> Outcome {
        Outcome::Proceed
    }

    /// Called over the outgoing response; returns the response to send
    fn after(&self, _req: &Request, resp: Response) -> Response {
        resp
    }

    /// Middleware name for logging
    fn name(&self) -> &'static str {
        "unnamed"
    }
}

/// One registered middleware and the valve that owns it, if any
#[derive(Clone)]
pub(crate) struct ChainEntry {
    pub middleware: Arc<dyn Middleware>,
    pub owner: Option<String>,
}

/// Ordered middleware chain
#[derive(Default, Clone)]
pub struct MiddlewareChain {
    entries: Vec<ChainEntry>,
}

impl MiddlewareChain {
    /// Create a new empty chain
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware to the chain
    pub fn add(&mut self, middleware: Arc<dyn Middleware>) {
        self.add_owned(middleware, None);
    }

    pub(crate) fn add_owned(&mut self, middleware: Arc<dyn Middleware>, owner: Option<String>) {
        self.entries.push(ChainEntry { middleware, owner });
    }

    /// Run pre-request hooks in registration order
    ///
    /// Stops at the first [`Outcome::Abort`] and returns it.
    pub fn run_before(&self, req: &mut Request) -> Outcome {
        for entry in &self.entries {
            match entry.middleware.before(req) {
                Outcome::Proceed => {}
                outcome @ Outcome::Abort(_) => return outcome,
            }
        }
        Outcome::Proceed
    }

    /// Run response hooks in registration order, threading the response
    #[must_use]
    pub fn run_after(&self, req: &Request, mut resp: Response) -> Response {
        for entry in &self.entries {
            resp = entry.middleware.after(req, resp);
        }
        resp
    }

    /// Number of registered middleware
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the chain is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }

    pub(crate) fn remove_owned(&mut self, owner: &str) {
        self.entries.retain(|e| e.owner.as_deref() != Some(owner));
    }
}

/// Logging middleware - structured request/response logging
#[derive(Default)]
pub struct LoggingMiddleware;

impl LoggingMiddleware {
    /// Create a new logging middleware
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for LoggingMiddleware {
    fn before(&self, req: &mut Request) -> Outcome {
        let request_id = req.header("x-request-id").unwrap_or("-");
        info!(
            method = %req.method,
            path = %req.path,
            request_id = %request_id,
            "Request received"
        );
        Outcome::Proceed
    }

    fn after(&self, req: &Request, resp: Response) -> Response {
        let request_id = req.header("x-request-id").unwrap_or("-");
        info!(
            method = %req.method,
            path = %req.path,
            status = resp.status,
            request_id = %request_id,
            "Response sent"
        );
        resp
    }

    fn name(&self) -> &'static str {
        "LoggingMiddleware"
    }
}

/// Timing middleware - measures request duration keyed by request id
pub struct TimingMiddleware {
    start_times: Mutex<HashMap<String, Instant>>,
}

impl Default for TimingMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingMiddleware {
    /// Create a new timing middleware
    #[must_use]
    pub fn new() -> Self {
        Self {
            start_times: Mutex::new(HashMap::new()),
        }
    }
}

impl Middleware for TimingMiddleware {
    fn before(&self, req: &mut Request) -> Outcome {
        if let Some(id) = req.header("x-request-id") {
            if let Ok(mut times) = self.start_times.lock() {
                times.insert(id.to_string(), Instant::now());
            }
        }
        Outcome::Proceed
    }

    fn after(&self, req: &Request, resp: Response) -> Response {
        if let Some(id) = req.header("x-request-id") {
            if let Ok(mut times) = self.start_times.lock() {
                if let Some(start) = times.remove(id) {
                    debug!(
                        method = %req.method,
                        path = %req.path,
                        duration_ms = %start.elapsed().as_millis(),
                        "Request timing"
                    );
                }
            }
        }
        resp
    }

    fn name(&self) -> &'static str {
        "TimingMiddleware"
    }
}

/// CORS middleware - adds Cross-Origin Resource Sharing headers
#[derive(Clone)]
pub struct CorsMiddleware {
    allow_origin: String,
    allow_methods: String,
    allow_headers: String,
}

impl Default for CorsMiddleware {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_string(),
            allow_methods: "GET, POST, PUT, DELETE, PATCH".to_string(),
            allow_headers: "Content-Type, Authorization".to_string(),
        }
    }
}

impl CorsMiddleware {
    /// Create a new CORS middleware with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set allowed origin
    #[must_use]
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.allow_origin = origin.into();
        self
    }

    /// Set allowed methods
    #[must_use]
    pub fn allow_methods(mut self, methods: impl Into<String>) -> Self {
        self.allow_methods = methods.into();
        self
    }

    /// Set allowed headers
    #[must_use]
    pub fn allow_headers(mut self, headers: impl Into<String>) -> Self {
        self.allow_headers = headers.into();
        self
    }

    /// The configured Access-Control-Allow-Origin value
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.allow_origin
    }
}

impl Middleware for CorsMiddleware {
    fn after(&self, _req: &Request, mut resp: Response) -> Response {
        resp.set_header("Access-Control-Allow-Origin", &self.allow_origin);
        resp.set_header("Access-Control-Allow-Methods", &self.allow_methods);
        resp.set_header("Access-Control-Allow-Headers", &self.allow_headers);
        resp
    }

    fn name(&self) -> &'static str {
        "CorsMiddleware"
    }
}

/// Token bucket rate limiting middleware keyed by client address
pub struct RateLimitMiddleware {
    capacity: u64,
    refill_per_sec: u64,
    state: Mutex<HashMap<String, Bucket>>,
}

struct Bucket {
    tokens: u64,
    last_refill: Instant,
}

impl RateLimitMiddleware {
    /// Create a new rate limiter
    #[must_use]
    pub fn new(capacity: u64, refill_per_sec: u64) -> Self {
        Self {
            capacity,
            refill_per_sec,
            state: Mutex::new(HashMap::new()),
        }
    }

    fn allow(&self, key: &str) -> bool {
        let mut map = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let bucket = map.entry(key.to_string()).or_insert(Bucket {
            tokens: self.capacity,
            last_refill: now,
        });
        let elapsed = now.duration_since(bucket.last_refill);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let refill = (elapsed.as_secs_f64() * self.refill_per_sec as f64) as u64;
        if refill > 0 {
            bucket.tokens = (bucket.tokens + refill).min(self.capacity);
            bucket.last_refill = now;
        }
        if bucket.tokens == 0 {
            return false;
        }
        bucket.tokens -= 1;
        true
    }
}

impl Middleware for RateLimitMiddleware {
    fn before(&self, req: &mut Request) -> Outcome {
        let key = req.header("x-client-ip").unwrap_or("unknown");
        if self.allow(key) {
            Outcome::Proceed
        } else {
            Outcome::Abort(
                Response::json(r#"{"error":"Rate limit exceeded"}"#).with_status(429),
            )
        }
    }

    fn name(&self) -> &'static str {
        "RateLimitMiddleware"
    }
}

/// JWT bearer authentication middleware
///
/// Validates `Authorization: Bearer <token>` against a shared secret and
/// stores the token subject in the request context under `principal`.
/// Requests to exempt path prefixes pass through unchecked.
pub struct JwtAuthMiddleware {
    decoding_key: DecodingKey,
    validation: Validation,
    exempt: Vec<String>,
}

impl JwtAuthMiddleware {
    /// Create an HS256 validator from a shared secret
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            exempt: Vec::new(),
        }
    }

    /// Exempt a path prefix from authentication
    #[must_use]
    pub fn exempt(mut self, prefix: impl Into<String>) -> Self {
        self.exempt.push(prefix.into());
        self
    }

    fn unauthorized() -> Outcome {
        Outcome::Abort(Response::json(r#"{"error":"Unauthorized"}"#).with_status(401))
    }
}

impl Middleware for JwtAuthMiddleware {
    fn before(&self, req: &mut Request) -> Outcome {
        if self.exempt.iter().any(|p| req.path.starts_with(p.as_str())) {
            return Outcome::Proceed;
        }

        let token = req
            .header("authorization")
            .and_then(|h| h.strip_prefix("Bearer "));
        let Some(token) = token else {
            return Self::unauthorized();
        };

        match decode::<serde_json::Value>(token, &self.decoding_key, &self.validation) {
            Ok(data) => {
                if let Some(sub) = data.claims.get("sub").and_then(|v| v.as_str()) {
                    req.set("principal", sub);
                }
                Outcome::Proceed
            }
            Err(e) => {
                warn!("JWT validation failed: {}", e);
                Self::unauthorized()
            }
        }
    }

    fn name(&self) -> &'static str {
        "JwtAuthMiddleware"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Method;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_request(path: &str) -> Request {
        Request::new(Method::Get, path.to_string(), HashMap::new(), None)
    }

    struct Recorder {
        calls: Arc<AtomicUsize>,
        abort: bool,
    }

    impl Middleware for Recorder {
        fn before(&self, _req: &mut Request) -> Outcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.abort {
                Outcome::Abort(Response::text("blocked").with_status(403))
            } else {
                Outcome::Proceed
            }
        }
    }

    #[test]
    fn test_chain_empty() {
        let chain = MiddlewareChain::new();
        assert!(chain.is_empty());
        assert_eq!(chain.len(), 0);
    }

    #[test]
    fn test_run_before_in_order_with_short_circuit() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let third = Arc::new(AtomicUsize::new(0));

        let mut chain = MiddlewareChain::new();
        chain.add(Arc::new(Recorder {
            calls: first.clone(),
            abort: false,
        }));
        chain.add(Arc::new(Recorder {
            calls: second.clone(),
            abort: true,
        }));
        chain.add(Arc::new(Recorder {
            calls: third.clone(),
            abort: false,
        }));

        let mut req = test_request("/");
        match chain.run_before(&mut req) {
            Outcome::Abort(resp) => {
                assert_eq!(resp.status, 403);
                assert_eq!(resp.body, "blocked");
            }
            Outcome::Proceed => panic!("expected abort"),
        }
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(third.load(Ordering::SeqCst), 0);
    }

    struct Tagger(&'static str);

    impl Middleware for Tagger {
        fn after(&self, _req: &Request, mut resp: Response) -> Response {
            resp.body.push_str(self.0);
            resp
        }
    }

    #[test]
    fn test_run_after_registration_order() {
        let mut chain = MiddlewareChain::new();
        chain.add(Arc::new(Tagger("a")));
        chain.add(Arc::new(Tagger("b")));

        let req = test_request("/");
        let resp = chain.run_after(&req, Response::text(""));
        assert_eq!(resp.body, "ab");
    }

    #[test]
    fn test_cors_headers_added() {
        let mw = CorsMiddleware::new().allow_origin("https://example.com");
        let req = test_request("/");
        let resp = mw.after(&req, Response::text("ok"));
        assert_eq!(
            resp.header("Access-Control-Allow-Origin"),
            Some("https://example.com")
        );
    }

    #[test]
    fn test_rate_limit_exhaustion() {
        let mw = RateLimitMiddleware::new(2, 0);
        let mut req = test_request("/");
        req.set_header("x-client-ip", "10.0.0.1");

        assert!(matches!(mw.before(&mut req), Outcome::Proceed));
        assert!(matches!(mw.before(&mut req), Outcome::Proceed));
        match mw.before(&mut req) {
            Outcome::Abort(resp) => assert_eq!(resp.status, 429),
            Outcome::Proceed => panic!("expected rate limit"),
        }
    }

    #[test]
    fn test_jwt_missing_token_aborts() {
        let mw = JwtAuthMiddleware::new("secret");
        let mut req = test_request("/private");
        match mw.before(&mut req) {
            Outcome::Abort(resp) => assert_eq!(resp.status, 401),
            Outcome::Proceed => panic!("expected 401"),
        }
    }

    #[test]
    fn test_jwt_exempt_prefix() {
        let mw = JwtAuthMiddleware::new("secret").exempt("/public");
        let mut req = test_request("/public/info");
        assert!(matches!(mw.before(&mut req), Outcome::Proceed));
    }
}
