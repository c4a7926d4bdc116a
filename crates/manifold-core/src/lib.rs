//! # Manifold Core
//!
//! Core runtime for the Manifold application engine: an embeddable HTTP
//! application layer with a middleware pipeline and a capability-gated
//! plugin ("valve") system.
//!
//! ## Modules
//!
//! - `app` - route table, dispatcher and valve registration
//! - `pattern` - path templates with `:name` parameters
//! - `request` / `response` - HTTP value types
//! - `middleware` - pre-request/response interception
//! - `valve` - capability-gated plugin contracts
//! - `tasks` - background task and health-check registries
//! - `cache` / `metrics` / `state` - shared runtime services
//! - `server` - Hyper transport with graceful shutdown
//! - `json` - SIMD-accelerated JSON helpers
//! - `config` / `logging` / `error` - configuration, tracing setup,
//!   error types

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod app;
pub mod cache;
pub mod config;
pub mod error;
pub mod json;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod pattern;
pub mod request;
pub mod response;
pub mod server;
pub mod state;
pub mod tasks;
pub mod valve;

pub use app::{handler, App, ErrorHandler, Handler};
pub use cache::Cache;
pub use config::{EngineConfig, Environment};
pub use error::{Error, Result};
pub use json::{parse_json, parse_json_bytes, to_json};
pub use logging::init_logging;
pub use metrics::Metrics;
pub use middleware::{
    CorsMiddleware, JwtAuthMiddleware, LoggingMiddleware, Middleware, MiddlewareChain, Outcome,
    RateLimitMiddleware, TimingMiddleware,
};
pub use pattern::RoutePattern;
pub use request::{Method, Request};
pub use response::Response;
pub use server::Server;
pub use state::AppState;
pub use tasks::{HealthCheckFn, HealthRegistry, HealthStatus, TaskFn, TaskRegistry};
pub use valve::{Capability, Valve, ValveContext};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, "0.1.0");
    }
}
