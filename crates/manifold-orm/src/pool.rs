//! # Connection Pool
//!
//! Hands out exclusive [`Database`] connections for concurrent callers.
//! Exhaustion is bounded by an acquire timeout rather than an immediate
//! error; a caller that waits past the timeout gets
//! [`OrmError::PoolExhausted`].

use crate::database::{connect_options, Database};
use crate::error::{OrmError, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::time::Duration;

/// Pool sizing configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of open connections
    pub max_connections: u32,
    /// How long `acquire` may wait for a free connection
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// A pool of SQLite connections
#[derive(Clone)]
pub struct Pool {
    inner: SqlitePool,
}

impl Pool {
    /// Open a pool over the database at `path`
    ///
    /// # Errors
    ///
    /// [`OrmError::OpenFailed`] with the backend's message.
    pub async fn open(path: &str, config: PoolConfig) -> Result<Self> {
        let open_failed = |e: sqlx::Error| OrmError::OpenFailed {
            path: path.to_string(),
            message: e.to_string(),
        };
        let options = connect_options(path).map_err(open_failed)?;
        let inner = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(open_failed)?;
        Ok(Self { inner })
    }

    /// Acquire an exclusive connection
    ///
    /// The connection returns to the pool when the [`Database`] is
    /// dropped.
    ///
    /// # Errors
    ///
    /// [`OrmError::PoolExhausted`] when no connection frees up within
    /// the acquire timeout.
    pub async fn acquire(&self) -> Result<Database> {
        let conn = self.inner.acquire().await?;
        Ok(Database::from_pooled(conn))
    }

    /// Number of currently open connections
    #[must_use]
    pub fn size(&self) -> u32 {
        self.inner.size()
    }

    /// Close every connection in the pool
    pub async fn close(&self) {
        self.inner.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_and_use() {
        let pool = Pool::open(":memory:", PoolConfig::default()).await.unwrap();
        let mut db = pool.acquire().await.unwrap();
        db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY)")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_exhaustion_times_out() {
        let config = PoolConfig {
            max_connections: 1,
            acquire_timeout: Duration::from_millis(50),
        };
        let pool = Pool::open(":memory:", config).await.unwrap();

        let held = pool.acquire().await.unwrap();
        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(err, OrmError::PoolExhausted));
        drop(held);

        // once the held connection returns, acquire succeeds again
        assert!(pool.acquire().await.is_ok());
    }
}
