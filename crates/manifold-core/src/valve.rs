//! # Valve Plugin System
//!
//! A valve is a plugin unit that extends a running application with
//! routes, middleware, background tasks and health checks. Every valve
//! declares up front which capabilities it needs; the context object
//! handed to its lifecycle callbacks checks that declaration before
//! every mutating operation, so an undeclared operation fails closed
//! with no side effect.
//!
//! Lifecycle: `init` runs synchronously during registration (a failure
//! aborts and rolls back the registration), `deinit` at unregistration
//! or teardown, and the optional app-start/app-stop callbacks at the
//! corresponding application transitions - start in registration order,
//! stop in reverse.

use crate::app::{App, ErrorHandler, Handler};
use crate::cache::Cache;
use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::middleware::Middleware;
use crate::request::Method;
use crate::tasks::{HealthCheckFn, TaskFn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// A permission a valve must declare before using the matching
/// context operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Register routes
    Routes,
    /// Register middleware
    Middleware,
    /// Register background tasks
    Tasks,
    /// Register health checks
    HealthChecks,
    /// Mount static file directories
    StaticFiles,
    /// Access the shared cache
    Cache,
    /// Access the metrics registry
    Metrics,
    /// Install the custom error handler
    ErrorHandler,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Routes => "routes",
            Self::Middleware => "middleware",
            Self::Tasks => "tasks",
            Self::HealthChecks => "health-checks",
            Self::StaticFiles => "static-files",
            Self::Cache => "cache",
            Self::Metrics => "metrics",
            Self::ErrorHandler => "error-handler",
        };
        f.write_str(name)
    }
}

/// A plugin unit with declared capabilities and lifecycle callbacks
pub trait Valve: Send + Sync {
    /// Unique name among concurrently registered valves
    fn name(&self) -> &str;

    /// Valve version string
    fn version(&self) -> &str {
        "0.1.0"
    }

    /// Human-readable description
    fn description(&self) -> &str {
        ""
    }

    /// Capabilities this valve requires
    fn capabilities(&self) -> &[Capability];

    /// Called synchronously during registration
    ///
    /// # Errors
    ///
    /// Any error aborts the registration; everything the valve
    /// registered through the context so far is rolled back.
    fn init(&self, ctx: &mut ValveContext<'_>) -> Result<()>;

    /// Called at unregistration or application teardown
    fn deinit(&self) {}

    /// Called when the application starts accepting connections
    ///
    /// Route and middleware registration is closed by this point; task
    /// and health-check registration is still permitted.
    ///
    /// # Errors
    ///
    /// An error aborts application startup.
    fn on_app_start(&self, _ctx: &mut ValveContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Called when the application stops
    fn on_app_stop(&self) {}
}

/// Capability-scoped handle passed into valve callbacks
///
/// Borrows the application for the duration of one callback; the borrow
/// makes it impossible for a valve to retain the context past its
/// callback's return.
pub struct ValveContext<'a> {
    app: &'a mut App,
    valve: String,
    capabilities: Vec<Capability>,
}

impl<'a> ValveContext<'a> {
    pub(crate) fn new(app: &'a mut App, valve: String, capabilities: Vec<Capability>) -> Self {
        Self {
            app,
            valve,
            capabilities,
        }
    }

    /// Name of the valve this context is scoped to
    #[must_use]
    pub fn valve_name(&self) -> &str {
        &self.valve
    }

    fn require(&self, capability: Capability) -> Result<()> {
        if self.capabilities.contains(&capability) {
            Ok(())
        } else {
            Err(Error::CapabilityRequired { capability })
        }
    }

    /// Register a route owned by this valve
    ///
    /// # Errors
    ///
    /// [`Error::CapabilityRequired`] without the `routes` capability;
    /// otherwise the same failures as app-level route registration.
    pub fn register_route(&mut self, method: Method, path: &str, handler: Handler) -> Result<()> {
        self.require(Capability::Routes)?;
        self.app
            .register_route_owned(method, path, handler, Some(self.valve.clone()))
    }

    /// Register a middleware owned by this valve
    ///
    /// # Errors
    ///
    /// [`Error::CapabilityRequired`] without the `middleware` capability;
    /// [`Error::ServerAlreadyBuilt`] once the engine accepts connections.
    pub fn register_middleware(&mut self, middleware: Arc<dyn Middleware>) -> Result<()> {
        self.require(Capability::Middleware)?;
        self.app
            .use_middleware_owned(middleware, Some(self.valve.clone()))
    }

    /// Register a background task owned by this valve
    ///
    /// An interval of `None` marks a one-shot task.
    ///
    /// # Errors
    ///
    /// [`Error::CapabilityRequired`] without the `tasks` capability.
    pub fn register_task(
        &mut self,
        name: &str,
        interval: Option<Duration>,
        run: TaskFn,
    ) -> Result<()> {
        self.require(Capability::Tasks)?;
        self.app
            .tasks()
            .register(name, interval, run, Some(self.valve.clone()));
        Ok(())
    }

    /// Register a health probe owned by this valve
    ///
    /// # Errors
    ///
    /// [`Error::CapabilityRequired`] without the `health-checks` capability.
    pub fn register_health_check(&mut self, name: &str, check: HealthCheckFn) -> Result<()> {
        self.require(Capability::HealthChecks)?;
        self.app
            .health()
            .register(name, check, Some(self.valve.clone()));
        Ok(())
    }

    /// Mount a static file directory owned by this valve
    ///
    /// # Errors
    ///
    /// [`Error::CapabilityRequired`] without the `static-files` capability;
    /// [`Error::ServerAlreadyBuilt`] once the engine accepts connections.
    pub fn serve_static(&mut self, mount: &str, directory: impl Into<PathBuf>) -> Result<()> {
        self.require(Capability::StaticFiles)?;
        self.app
            .serve_static_owned(mount, directory.into(), Some(self.valve.clone()))
    }

    /// Get a handle to the shared cache
    ///
    /// # Errors
    ///
    /// [`Error::CapabilityRequired`] without the `cache` capability.
    pub fn cache(&self) -> Result<Cache> {
        self.require(Capability::Cache)?;
        Ok(self.app.cache())
    }

    /// Get a handle to the metrics registry
    ///
    /// # Errors
    ///
    /// [`Error::CapabilityRequired`] without the `metrics` capability.
    pub fn metrics(&self) -> Result<Metrics> {
        self.require(Capability::Metrics)?;
        Ok(self.app.metrics())
    }

    /// Install the application's custom error handler
    ///
    /// # Errors
    ///
    /// [`Error::CapabilityRequired`] without the `error-handler`
    /// capability; [`Error::ServerAlreadyBuilt`] once the engine accepts
    /// connections.
    pub fn set_error_handler(&mut self, handler: ErrorHandler) -> Result<()> {
        self.require(Capability::ErrorHandler)?;
        self.app.set_error_handler(handler)
    }
}
