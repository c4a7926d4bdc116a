//! # Engine Configuration
//!
//! Startup configuration for the application engine: bind address,
//! deployment environment and registration ceilings.

use std::net::SocketAddr;
use std::time::Duration;

/// Deployment environment the engine runs under
///
/// Selects logging defaults; production additionally suppresses
/// error details in generic failure responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Local development
    #[default]
    Development,
    /// Pre-production staging
    Staging,
    /// Production deployment
    Production,
}

impl Environment {
    /// Whether this is a production deployment
    #[must_use]
    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Staging => write!(f, "staging"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Address to bind the server to
    pub address: SocketAddr,
    /// Deployment environment
    pub environment: Environment,
    /// Maximum number of registrable routes
    pub max_routes: usize,
    /// Maximum number of registrable valves
    pub max_valves: usize,
    /// Max request body size in bytes
    pub max_body_size: usize,
    /// Enable keep-alive connections
    pub keep_alive: bool,
    /// Shutdown timeout for graceful shutdown
    pub shutdown_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            address: ([127, 0, 0, 1], 8000).into(),
            environment: Environment::Development,
            max_routes: 256,
            max_valves: 32,
            max_body_size: 1024 * 1024,
            keep_alive: true,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl EngineConfig {
    /// Create a configuration for the given environment with defaults otherwise
    #[must_use]
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            ..Self::default()
        }
    }

    /// Set the bind address
    #[must_use]
    pub fn with_address(mut self, address: SocketAddr) -> Self {
        self.address = address;
        self
    }

    /// Set the route ceiling
    #[must_use]
    pub fn with_max_routes(mut self, max_routes: usize) -> Self {
        self.max_routes = max_routes;
        self
    }

    /// Set the valve ceiling
    #[must_use]
    pub fn with_max_valves(mut self, max_valves: usize) -> Self {
        self.max_valves = max_valves;
        self
    }

    /// Set the max request body size
    #[must_use]
    pub fn with_max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.address.port(), 8000);
        assert_eq!(config.max_routes, 256);
        assert_eq!(config.max_valves, 32);
        assert!(config.keep_alive);
        assert_eq!(config.environment, Environment::Development);
    }

    #[test]
    fn test_config_builders() {
        let config = EngineConfig::new(Environment::Production)
            .with_max_routes(8)
            .with_max_valves(2)
            .with_max_body_size(512);
        assert!(config.environment.is_production());
        assert_eq!(config.max_routes, 8);
        assert_eq!(config.max_valves, 2);
        assert_eq!(config.max_body_size, 512);
    }

    #[test]
    fn test_environment_display() {
        assert_eq!(Environment::Staging.to_string(), "staging");
    }
}
