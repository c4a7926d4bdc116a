//! # Error Handling
//!
//! Centralized error types for the Manifold engine core.
//! Uses `thiserror` for ergonomic error definitions.

use crate::valve::Capability;
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the Manifold runtime
#[derive(Error, Debug)]
pub enum Error {
    /// Server failed to bind to the specified address
    #[error("Failed to bind server to {address}: {source}")]
    Bind {
        /// The address we tried to bind to
        address: String,
        /// The underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Invalid route pattern provided at registration
    #[error("Invalid route pattern: {pattern}: {reason}")]
    InvalidPath {
        /// The invalid pattern
        pattern: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Route table reached its configured ceiling
    #[error("Route table is full (limit: {limit})")]
    TooManyRoutes {
        /// Configured maximum number of routes
        limit: usize,
    },

    /// Valve registry reached its configured ceiling
    #[error("Valve registry is full (limit: {limit})")]
    TooManyValves {
        /// Configured maximum number of valves
        limit: usize,
    },

    /// Registration attempted after the engine started accepting connections
    #[error("Registration is closed: the server has already been built")]
    ServerAlreadyBuilt,

    /// A valve with the same name is already active
    #[error("A valve named '{name}' is already registered")]
    ValveAlreadyRegistered {
        /// The conflicting valve name
        name: String,
    },

    /// No active valve with the given name
    #[error("No valve named '{name}' is registered")]
    ValveNotFound {
        /// The requested valve name
        name: String,
    },

    /// A valve context operation was not covered by the valve's declared capabilities
    #[error("Operation requires the '{capability}' capability")]
    CapabilityRequired {
        /// The missing capability
        capability: Capability,
    },

    /// A valve's init callback reported a failure
    #[error("Valve '{name}' failed to initialize: {message}")]
    ValveInit {
        /// The valve that failed
        name: String,
        /// The failure description
        message: String,
    },

    /// A request handler reported a failure
    #[error("Handler error: {message}")]
    Handler {
        /// The failure description
        message: String,
    },

    /// HTTP method not representable by the engine
    #[error("Unsupported HTTP method: {method}")]
    MethodNotSupported {
        /// The raw method token
        method: String,
    },

    /// Request payload too large
    #[error("Payload too large: limit={limit} bytes, received={actual} bytes")]
    PayloadTooLarge {
        /// Max allowed size
        limit: usize,
        /// Actual size
        actual: usize,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {message}")]
    Json {
        /// Parser or serializer message
        message: String,
    },

    /// HTTP protocol error
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Convenience constructor for handler failures
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler {
            message: message.into(),
        }
    }
}
