//! # Migrations
//!
//! Ordered, versioned schema migrations applied inside transactions and
//! tracked in a `_migrations` metadata table. Re-running a set applies
//! only what is missing; a failure rolls the transaction back and halts
//! the run.
//!
//! One narrow recovery path exists for partially-applied histories: when
//! an `ALTER TABLE ... ADD COLUMN` step fails but the live schema shows
//! the column already present, the migration is recorded as applied and
//! the run continues. The trigger is a text match on the up-SQL, not a
//! SQL parser - statements spelled differently fall back to the normal
//! failure path.

use crate::database::{Database, DbTransaction};
use crate::error::{OrmError, Result};
use crate::value::escape_text;
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

const METADATA_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS _migrations (\
     version INTEGER PRIMARY KEY, name TEXT NOT NULL, applied_at TEXT NOT NULL)";

/// One versioned schema change
#[derive(Debug, Clone)]
pub struct Migration {
    /// Unique, strictly ordered version
    pub version: i64,
    /// Human-readable name
    pub name: String,
    /// Forward SQL
    pub up: String,
    /// Reverse SQL
    pub down: String,
}

impl Migration {
    /// Create a migration
    #[must_use]
    pub fn new(
        version: i64,
        name: impl Into<String>,
        up: impl Into<String>,
        down: impl Into<String>,
    ) -> Self {
        Self {
            version,
            name: name.into(),
            up: up.into(),
            down: down.into(),
        }
    }
}

/// An ordered, duplicate-free migration registry
#[derive(Debug, Clone, Default)]
pub struct MigrationSet {
    migrations: Vec<Migration>,
}

impl MigrationSet {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a migration, keeping the set sorted by version
    ///
    /// # Errors
    ///
    /// [`OrmError::DuplicateMigrationVersion`] when the version is taken.
    pub fn add(&mut self, migration: Migration) -> Result<()> {
        match self
            .migrations
            .binary_search_by_key(&migration.version, |m| m.version)
        {
            Ok(_) => Err(OrmError::DuplicateMigrationVersion {
                version: migration.version,
            }),
            Err(position) => {
                self.migrations.insert(position, migration);
                Ok(())
            }
        }
    }

    /// Look up a migration by version
    #[must_use]
    pub fn get(&self, version: i64) -> Option<&Migration> {
        self.migrations
            .binary_search_by_key(&version, |m| m.version)
            .ok()
            .map(|i| &self.migrations[i])
    }

    /// Iterate in ascending version order
    pub fn iter(&self) -> std::slice::Iter<'_, Migration> {
        self.migrations.iter()
    }

    /// Number of migrations
    #[must_use]
    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    /// Check if the set is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Highest version in the set
    #[must_use]
    pub fn latest_version(&self) -> Option<i64> {
        self.migrations.last().map(|m| m.version)
    }

    /// Discover migrations from `{version}_{name}.sql` files
    ///
    /// Each file holds an `-- up` section followed by a `-- down`
    /// section. Malformed files (bad name, missing sections, duplicate
    /// versions) are skipped with a warning rather than failing the
    /// pass.
    ///
    /// # Errors
    ///
    /// [`OrmError::Io`] when the directory itself cannot be read.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let mut set = Self::new();
        let mut entries: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(std::result::Result::ok)
            .map(|e| e.path())
            .collect();
        entries.sort();

        for path in entries {
            if path.extension().and_then(|e| e.to_str()) != Some("sql") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some(migration) = parse_migration_file(stem, &path) else {
                warn!(file = %path.display(), "Skipping malformed migration file");
                continue;
            };
            let version = migration.version;
            if set.add(migration).is_err() {
                warn!(file = %path.display(), version, "Skipping duplicate migration version");
            }
        }
        Ok(set)
    }
}

impl<'a> IntoIterator for &'a MigrationSet {
    type Item = &'a Migration;
    type IntoIter = std::slice::Iter<'a, Migration>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Parse one `{version}_{name}.sql` file; `None` when malformed
fn parse_migration_file(stem: &str, path: &Path) -> Option<Migration> {
    let (version, name) = stem.split_once('_')?;
    let version: i64 = version.parse().ok()?;
    let content = std::fs::read_to_string(path).ok()?;

    enum Section {
        Preamble,
        Up,
        Down,
    }

    let mut up = String::new();
    let mut down = String::new();
    let mut section = Section::Preamble;
    let mut saw_up = false;
    let mut saw_down = false;

    for line in content.lines() {
        let marker = line.trim().to_ascii_lowercase();
        if marker == "-- up" {
            saw_up = true;
            section = Section::Up;
        } else if marker == "-- down" {
            saw_down = true;
            section = Section::Down;
        } else {
            let target = match section {
                Section::Preamble => continue,
                Section::Up => &mut up,
                Section::Down => &mut down,
            };
            target.push_str(line);
            target.push('\n');
        }
    }

    if !saw_up || !saw_down {
        return None;
    }
    Some(Migration::new(
        version,
        name,
        up.trim().to_string(),
        down.trim().to_string(),
    ))
}

impl Database {
    async fn ensure_migrations_table(&mut self) -> Result<()> {
        self.execute(METADATA_TABLE_SQL).await?;
        Ok(())
    }

    async fn applied_versions(&mut self) -> Result<HashSet<i64>> {
        let mut result = self.query("SELECT version FROM _migrations").await?;
        let mut versions = HashSet::new();
        while let Some(row) = result.next_row() {
            versions.insert(row.get_int64(0));
        }
        Ok(versions)
    }

    async fn record_applied(&mut self, migration: &Migration) -> Result<()> {
        self.execute(&metadata_insert_sql(migration)).await?;
        Ok(())
    }

    /// Apply every pending migration in ascending version order
    ///
    /// Each migration runs inside its own transaction together with its
    /// metadata row. Returns the number of migrations applied (or
    /// recovered). On failure the run halts: later migrations are not
    /// attempted and the error propagates with the backend's message.
    ///
    /// # Errors
    ///
    /// [`OrmError::Query`] from the first failing migration, unless the
    /// add-column recovery applies.
    pub async fn run_migrations(&mut self, set: &MigrationSet) -> Result<u32> {
        self.ensure_migrations_table().await?;
        let applied = self.applied_versions().await?;

        let mut count = 0;
        for migration in set {
            if applied.contains(&migration.version) {
                continue;
            }
            match self.apply_migration(migration).await {
                Ok(()) => count += 1,
                Err(err) => {
                    if self.already_has_column(migration).await {
                        warn!(
                            version = migration.version,
                            name = %migration.name,
                            "Column already present; recording migration as applied"
                        );
                        self.record_applied(migration).await?;
                        count += 1;
                        continue;
                    }
                    return Err(err);
                }
            }
        }
        Ok(count)
    }

    async fn apply_migration(&mut self, migration: &Migration) -> Result<()> {
        let mut tx = self.begin().await?;
        if let Err(err) = tx.execute(&migration.up).await {
            rollback_quietly(tx, migration.version).await;
            return Err(err);
        }
        if let Err(err) = tx.execute(&metadata_insert_sql(migration)).await {
            rollback_quietly(tx, migration.version).await;
            return Err(err);
        }
        tx.commit().await
    }

    /// Whether the failed migration was an add-column step whose column
    /// already exists in the live schema
    async fn already_has_column(&mut self, migration: &Migration) -> bool {
        let Some((table, column)) = parse_alter_add_column(&migration.up) else {
            return false;
        };
        let Ok(mut result) = self
            .query(&format!("PRAGMA table_info({})", quote_ident(&table)))
            .await
        else {
            return false;
        };

        // PRAGMA table_info columns: cid, name, type, notnull, dflt_value, pk
        while let Some(row) = result.next_row() {
            if row
                .get_text(1)
                .is_some_and(|name| name.eq_ignore_ascii_case(&column))
            {
                return true;
            }
        }
        false
    }

    /// Revert one applied migration
    ///
    /// Runs the down-SQL and deletes the metadata row inside one
    /// transaction.
    ///
    /// # Errors
    ///
    /// [`OrmError::MigrationNotFound`] when the version is not in the
    /// set, [`OrmError::MigrationNotApplied`] when it was never
    /// recorded, or [`OrmError::Query`] from the backend.
    pub async fn rollback_migration(&mut self, version: i64, set: &MigrationSet) -> Result<()> {
        let migration = set
            .get(version)
            .ok_or(OrmError::MigrationNotFound { version })?;

        self.ensure_migrations_table().await?;
        if !self.applied_versions().await?.contains(&version) {
            return Err(OrmError::MigrationNotApplied { version });
        }

        let mut tx = self.begin().await?;
        if let Err(err) = tx.execute(&migration.down).await {
            rollback_quietly(tx, version).await;
            return Err(err);
        }
        if let Err(err) = tx
            .execute(&format!("DELETE FROM _migrations WHERE version = {version}"))
            .await
        {
            rollback_quietly(tx, version).await;
            return Err(err);
        }
        tx.commit().await
    }
}

/// Best-effort rollback; a rollback failure is reported but never
/// replaces the original error
async fn rollback_quietly(tx: DbTransaction<'_>, version: i64) {
    if let Err(rollback_err) = tx.rollback().await {
        warn!(version, error = %rollback_err, "Rollback after failed migration also failed");
    }
}

fn metadata_insert_sql(migration: &Migration) -> String {
    format!(
        "INSERT INTO _migrations (version, name, applied_at) VALUES ({}, {}, datetime('now'))",
        migration.version,
        escape_text(&migration.name)
    )
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Recognize `ALTER TABLE <table> ADD [COLUMN] <column> ...`
///
/// Returns the table and column names with any quoting stripped.
fn parse_alter_add_column(sql: &str) -> Option<(String, String)> {
    let mut tokens = sql.split_whitespace();
    if !tokens.next()?.eq_ignore_ascii_case("alter") {
        return None;
    }
    if !tokens.next()?.eq_ignore_ascii_case("table") {
        return None;
    }
    let table = tokens.next()?;
    if !tokens.next()?.eq_ignore_ascii_case("add") {
        return None;
    }
    let mut column = tokens.next()?;
    if column.eq_ignore_ascii_case("column") {
        column = tokens.next()?;
    }
    Some((strip_ident(table), strip_ident(column)))
}

fn strip_ident(token: &str) -> String {
    token
        .trim_end_matches(';')
        .trim_matches(|c| c == '"' || c == '`' || c == '\'' || c == '[' || c == ']')
        .to_string()
}
