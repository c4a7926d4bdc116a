//! # Manifold ORM
//!
//! Lightweight object mapper for the Manifold application engine:
//! name-keyed row mapping into derived record types, substitution-built
//! statements, transactional migrations and a connection pool, all over
//! SQLite.
//!
//! ## Modules
//!
//! - `database` - one-connection access: execute, query, transactions
//! - `pool` - exclusive connections for concurrent callers
//! - `record` - the `Record` contract and column conversions
//! - `mapper` - strict name-matched row materialization
//! - `statement` - INSERT/UPDATE/SELECT/DELETE building
//! - `repo` - create/find/update/delete over the above
//! - `migrate` - versioned, transactional schema migrations
//! - `value` / `error` - value enums and typed errors

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod database;
pub mod error;
pub mod mapper;
pub mod migrate;
pub mod pool;
pub mod record;
pub mod repo;
pub mod statement;
pub mod value;

pub use database::{Database, DbTransaction, ResultSet, Row};
pub use error::{OrmError, Result};
pub use mapper::to_records;
pub use migrate::{Migration, MigrationSet};
pub use pool::{Pool, PoolConfig};
pub use record::{ColumnIndex, FromColumn, Ordinal, Record, ToColumn};
pub use statement::{condition_eq, delete_sql, insert_sql, select_sql, update_sql};
pub use value::{escape_text, DbValue, SqlValue};

pub use manifold_macros::{Ordinal, Record};

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
