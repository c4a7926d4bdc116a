//! # Application & Route Dispatcher
//!
//! Owns the route table, the middleware chain, the valve registry and
//! the task/health registries. Registration is a build-phase operation
//! taking `&mut self` and gated by an explicit built flag; dispatch is a
//! read-only operation safe to run concurrently from many connection
//! tasks.
//!
//! Dispatch scans routes in registration order and the first entry whose
//! method and pattern both match wins - overlap between patterns is
//! resolved by registration order alone, never by specificity.

use crate::cache::Cache;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::middleware::{Middleware, MiddlewareChain, Outcome};
use crate::pattern::RoutePattern;
use crate::request::{Method, Request};
use crate::response::Response;
use crate::state::AppState;
use crate::tasks::{HealthRegistry, HealthStatus, TaskRegistry};
use crate::valve::{Valve, ValveContext};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Boxed future returned by request handlers
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Response>> + Send>>;

/// Request handler
///
/// Handlers receive the request by shared reference and return an owned
/// future; data needed inside the future is cloned out of the request
/// first.
pub type Handler = Arc<dyn Fn(&Request) -> HandlerFuture + Send + Sync>;

/// Hook translating a handler error into an HTTP response
pub type ErrorHandler = Arc<dyn Fn(&Error) -> Response + Send + Sync>;

/// Wrap an async closure into a [`Handler`]
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(&Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    Arc::new(move |req: &Request| -> HandlerFuture { Box::pin(f(req)) })
}

/// One registered route
struct RouteEntry {
    method: Method,
    pattern: RoutePattern,
    handler: Handler,
    owner: Option<String>,
}

/// One mounted static directory
struct StaticMount {
    mount: String,
    directory: PathBuf,
    owner: Option<String>,
}

/// Registry lengths captured before a valve's init runs, restored if it
/// fails
struct RegistrationSnapshot {
    routes: usize,
    middleware: usize,
    tasks: usize,
    health: usize,
    mounts: usize,
    error_handler: Option<ErrorHandler>,
}

/// The application engine
pub struct App {
    config: EngineConfig,
    routes: Vec<RouteEntry>,
    middleware: MiddlewareChain,
    valves: Vec<Arc<dyn Valve>>,
    tasks: TaskRegistry,
    health: HealthRegistry,
    cache: Cache,
    metrics: Metrics,
    state: AppState,
    static_mounts: Vec<StaticMount>,
    error_handler: Option<ErrorHandler>,
    built: AtomicBool,
}

impl Default for App {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl App {
    /// Create a new application with the given configuration
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            routes: Vec::new(),
            middleware: MiddlewareChain::new(),
            valves: Vec::new(),
            tasks: TaskRegistry::new(),
            health: HealthRegistry::new(),
            cache: Cache::new(),
            metrics: Metrics::new(),
            state: AppState::new(),
            static_mounts: Vec::new(),
            error_handler: None,
            built: AtomicBool::new(false),
        }
    }

    /// The engine configuration
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Handle to the shared cache
    #[must_use]
    pub fn cache(&self) -> Cache {
        self.cache.clone()
    }

    /// Handle to the metrics registry
    #[must_use]
    pub fn metrics(&self) -> Metrics {
        self.metrics.clone()
    }

    /// Handle to the shared application state
    #[must_use]
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// The background task registry
    #[must_use]
    pub fn tasks(&self) -> &TaskRegistry {
        &self.tasks
    }

    /// The health probe registry
    #[must_use]
    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }

    /// Aggregate health across all registered probes
    #[must_use]
    pub fn health_status(&self) -> HealthStatus {
        self.health.aggregate()
    }

    /// Number of registered routes
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Number of registered middleware
    #[must_use]
    pub fn middleware_count(&self) -> usize {
        self.middleware.len()
    }

    /// Number of active valves
    #[must_use]
    pub fn valve_count(&self) -> usize {
        self.valves.len()
    }

    /// Whether the engine has started accepting connections
    #[must_use]
    pub fn is_built(&self) -> bool {
        self.built.load(Ordering::Acquire)
    }

    fn ensure_buildable(&self) -> Result<()> {
        if self.is_built() {
            Err(Error::ServerAlreadyBuilt)
        } else {
            Ok(())
        }
    }

    /// Register a route
    ///
    /// # Errors
    ///
    /// [`Error::ServerAlreadyBuilt`] after startup,
    /// [`Error::TooManyRoutes`] at the configured ceiling,
    /// [`Error::InvalidPath`] if the pattern does not parse.
    pub fn register_route(&mut self, method: Method, path: &str, handler: Handler) -> Result<()> {
        self.register_route_owned(method, path, handler, None)
    }

    pub(crate) fn register_route_owned(
        &mut self,
        method: Method,
        path: &str,
        handler: Handler,
        owner: Option<String>,
    ) -> Result<()> {
        self.ensure_buildable()?;
        if self.routes.len() >= self.config.max_routes {
            return Err(Error::TooManyRoutes {
                limit: self.config.max_routes,
            });
        }
        let pattern = RoutePattern::parse(path)?;
        self.routes.push(RouteEntry {
            method,
            pattern,
            handler,
            owner,
        });
        Ok(())
    }

    /// Register a GET route
    ///
    /// # Errors
    ///
    /// See [`App::register_route`].
    pub fn get(&mut self, path: &str, handler: Handler) -> Result<()> {
        self.register_route(Method::Get, path, handler)
    }

    /// Register a POST route
    ///
    /// # Errors
    ///
    /// See [`App::register_route`].
    pub fn post(&mut self, path: &str, handler: Handler) -> Result<()> {
        self.register_route(Method::Post, path, handler)
    }

    /// Register a PUT route
    ///
    /// # Errors
    ///
    /// See [`App::register_route`].
    pub fn put(&mut self, path: &str, handler: Handler) -> Result<()> {
        self.register_route(Method::Put, path, handler)
    }

    /// Register a DELETE route
    ///
    /// # Errors
    ///
    /// See [`App::register_route`].
    pub fn delete(&mut self, path: &str, handler: Handler) -> Result<()> {
        self.register_route(Method::Delete, path, handler)
    }

    /// Register a PATCH route
    ///
    /// # Errors
    ///
    /// See [`App::register_route`].
    pub fn patch(&mut self, path: &str, handler: Handler) -> Result<()> {
        self.register_route(Method::Patch, path, handler)
    }

    /// Append a middleware to the chain
    ///
    /// # Errors
    ///
    /// [`Error::ServerAlreadyBuilt`] after startup.
    pub fn use_middleware(&mut self, middleware: Arc<dyn Middleware>) -> Result<()> {
        self.use_middleware_owned(middleware, None)
    }

    pub(crate) fn use_middleware_owned(
        &mut self,
        middleware: Arc<dyn Middleware>,
        owner: Option<String>,
    ) -> Result<()> {
        self.ensure_buildable()?;
        self.middleware.add_owned(middleware, owner);
        Ok(())
    }

    /// Mount a static file directory under a path prefix
    ///
    /// # Errors
    ///
    /// [`Error::ServerAlreadyBuilt`] after startup.
    pub fn serve_static(&mut self, mount: &str, directory: impl Into<PathBuf>) -> Result<()> {
        self.serve_static_owned(mount, directory.into(), None)
    }

    pub(crate) fn serve_static_owned(
        &mut self,
        mount: &str,
        directory: PathBuf,
        owner: Option<String>,
    ) -> Result<()> {
        self.ensure_buildable()?;
        self.static_mounts.push(StaticMount {
            mount: mount.trim_end_matches('/').to_string(),
            directory,
            owner,
        });
        Ok(())
    }

    /// Install the custom error handler hook
    ///
    /// # Errors
    ///
    /// [`Error::ServerAlreadyBuilt`] after startup.
    pub fn set_error_handler(&mut self, handler: ErrorHandler) -> Result<()> {
        self.ensure_buildable()?;
        self.error_handler = Some(handler);
        Ok(())
    }

    /// Register a valve
    ///
    /// Runs the valve's `init` callback synchronously with a context
    /// scoped to its declared capabilities. If `init` fails, everything
    /// it registered is rolled back, the valve does not join the active
    /// set and the error propagates.
    ///
    /// # Errors
    ///
    /// [`Error::ServerAlreadyBuilt`] after startup,
    /// [`Error::TooManyValves`] at the configured ceiling,
    /// [`Error::ValveAlreadyRegistered`] on a name conflict, or whatever
    /// `init` returned.
    pub fn register_valve(&mut self, valve: Arc<dyn Valve>) -> Result<()> {
        self.ensure_buildable()?;
        if self.valves.len() >= self.config.max_valves {
            return Err(Error::TooManyValves {
                limit: self.config.max_valves,
            });
        }
        let name = valve.name().to_string();
        if self.valves.iter().any(|v| v.name() == name) {
            return Err(Error::ValveAlreadyRegistered { name });
        }

        let snapshot = self.snapshot();
        let capabilities = valve.capabilities().to_vec();
        let result = {
            let mut ctx = ValveContext::new(self, name.clone(), capabilities);
            valve.init(&mut ctx)
        };

        match result {
            Ok(()) => {
                info!(valve = %name, version = %valve.version(), "Valve registered");
                self.valves.push(valve);
                Ok(())
            }
            Err(err) => {
                warn!(valve = %name, error = %err, "Valve init failed; rolling back");
                self.restore(snapshot);
                Err(err)
            }
        }
    }

    /// Unregister a valve by name
    ///
    /// Runs `deinit` and removes every route, middleware, task, health
    /// check and static mount the valve owns.
    ///
    /// # Errors
    ///
    /// [`Error::ValveNotFound`] if no active valve has that name.
    pub fn unregister_valve(&mut self, name: &str) -> Result<()> {
        let index = self
            .valves
            .iter()
            .position(|v| v.name() == name)
            .ok_or_else(|| Error::ValveNotFound {
                name: name.to_string(),
            })?;
        let valve = self.valves.remove(index);
        valve.deinit();

        self.routes.retain(|r| r.owner.as_deref() != Some(name));
        self.middleware.remove_owned(name);
        self.tasks.remove_owned(name);
        self.health.remove_owned(name);
        self.static_mounts
            .retain(|m| m.owner.as_deref() != Some(name));

        info!(valve = %name, "Valve unregistered");
        Ok(())
    }

    fn snapshot(&self) -> RegistrationSnapshot {
        RegistrationSnapshot {
            routes: self.routes.len(),
            middleware: self.middleware.len(),
            tasks: self.tasks.len(),
            health: self.health.len(),
            mounts: self.static_mounts.len(),
            error_handler: self.error_handler.clone(),
        }
    }

    fn restore(&mut self, snapshot: RegistrationSnapshot) {
        self.routes.truncate(snapshot.routes);
        self.middleware.truncate(snapshot.middleware);
        self.tasks.truncate(snapshot.tasks);
        self.health.truncate(snapshot.health);
        self.static_mounts.truncate(snapshot.mounts);
        self.error_handler = snapshot.error_handler;
    }

    /// Close registration and run start-of-life callbacks
    ///
    /// Marks the engine built, invokes each valve's `on_app_start` in
    /// registration order, then hands registered background tasks to the
    /// tokio scheduler. Must run inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// The first error returned by a valve's `on_app_start`.
    pub fn start(&mut self) -> Result<Vec<tokio::task::JoinHandle<()>>> {
        self.built.store(true, Ordering::Release);

        let valves: Vec<Arc<dyn Valve>> = self.valves.clone();
        for valve in valves {
            let capabilities = valve.capabilities().to_vec();
            let name = valve.name().to_string();
            let mut ctx = ValveContext::new(self, name, capabilities);
            valve.on_app_start(&mut ctx)?;
        }

        Ok(self.tasks.spawn_all())
    }

    /// Run end-of-life callbacks: each valve's `on_app_stop`, in reverse
    /// registration order
    pub fn stop(&self) {
        for valve in self.valves.iter().rev() {
            valve.on_app_stop();
        }
    }

    /// Process one request through the full pipeline
    ///
    /// Route match and parameter binding happen first, then pre-request
    /// middleware (which may abort), then the handler, then response
    /// middleware. A miss across routes and static mounts synthesizes a
    /// 404.
    pub async fn dispatch(&self, mut req: Request) -> Response {
        if req.header("x-request-id").is_none() {
            let request_id = generate_request_id();
            req.set_header("x-request-id", &request_id);
        }
        if let Some(id) = req.header("x-request-id") {
            let id = id.to_string();
            req.set("request_id", id);
        }
        self.metrics.incr("requests_total");

        let mut matched = None;
        for entry in &self.routes {
            if entry.method != req.method {
                continue;
            }
            if let Some(params) = entry.pattern.match_path(&req.path) {
                matched = Some((entry, params));
                break;
            }
        }

        let Some((entry, params)) = matched else {
            if let Some(resp) = self.try_static(&req).await {
                self.metrics.incr(&format!("responses_{}", resp.status));
                return resp;
            }
            self.metrics.incr("responses_404");
            return Response::json(r#"{"error":"Not Found"}"#).with_status(404);
        };
        req.bind_params(params);

        let response = match self.middleware.run_before(&mut req) {
            Outcome::Abort(resp) => {
                self.metrics.incr(&format!("responses_{}", resp.status));
                return resp;
            }
            Outcome::Proceed => match (entry.handler)(&req).await {
                Ok(resp) => resp,
                Err(err) => {
                    error!(path = %req.path, error = %err, "Handler failed");
                    self.metrics.incr("handler_errors");
                    self.render_error(&err)
                }
            },
        };

        let mut response = response;
        if let Some(id) = req.header("x-request-id") {
            let id = id.to_string();
            response.set_header("x-request-id", &id);
        }
        let response = self.middleware.run_after(&req, response);
        self.metrics.incr(&format!("responses_{}", response.status));
        response
    }

    fn render_error(&self, err: &Error) -> Response {
        if let Some(hook) = &self.error_handler {
            return hook(err);
        }
        if self.config.environment.is_production() {
            Response::json(r#"{"error":"Internal Server Error"}"#).with_status(500)
        } else {
            Response::json(format!(r#"{{"error":"{err}"}}"#)).with_status(500)
        }
    }

    /// Serve a file from a static mount, if one covers the request path
    async fn try_static(&self, req: &Request) -> Option<Response> {
        if req.method != Method::Get {
            return None;
        }
        for mount in &self.static_mounts {
            let Some(rest) = req.path.strip_prefix(&mount.mount) else {
                continue;
            };
            if !rest.is_empty() && !rest.starts_with('/') {
                continue;
            }
            let rest = rest.trim_start_matches('/');
            if rest.is_empty() || rest.split('/').any(|part| part == "..") {
                continue;
            }
            let file_path = mount.directory.join(rest);
            match tokio::fs::read(&file_path).await {
                Ok(bytes) => {
                    let body = String::from_utf8_lossy(&bytes).into_owned();
                    let content_type = content_type_for(&file_path);
                    return Some(
                        Response::text(body).with_header("Content-Type", content_type),
                    );
                }
                Err(_) => continue,
            }
        }
        None
    }
}

fn content_type_for(path: &std::path::Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

static REQUEST_COUNTER: AtomicUsize = AtomicUsize::new(1);

fn generate_request_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let counter = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{:x}-{:x}", now.as_nanos(), counter)
}
