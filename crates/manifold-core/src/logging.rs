//! # Logging Setup
//!
//! One-call tracing subscriber installation for binaries embedding the
//! engine. Library code only emits `tracing` events and never installs a
//! subscriber itself.

use crate::config::Environment;
use tracing_subscriber::EnvFilter;

/// Install a global tracing subscriber appropriate for the environment
///
/// Development and staging get human-readable output; production gets
/// JSON lines. The `RUST_LOG` variable overrides the default filter.
/// Calling this twice is a no-op (the second install fails silently).
pub fn init_logging(environment: Environment) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if environment.is_production() {
            EnvFilter::new("info")
        } else {
            EnvFilter::new("debug")
        }
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if environment.is_production() {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    // already-installed subscribers keep precedence
    let _ = result;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_logging(Environment::Development);
        init_logging(Environment::Production);
    }
}
