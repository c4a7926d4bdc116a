//! # Record Contract
//!
//! The `Record` trait ties a struct to a table: the table name is the
//! type's name verbatim, the field list is the struct's declared fields
//! in order, and conversion in both directions goes through the
//! `FromColumn`/`ToColumn` traits. Implementations come from
//! `#[derive(Record)]`; a field whose type has no `FromColumn` impl is
//! rejected at compile time.
//!
//! Enums are stored as their 0-based declaration ordinal via the
//! `Ordinal` trait (`#[derive(Ordinal)]`); reading back an ordinal with
//! no matching variant is a hard error.

use crate::database::{ResultSet, Row};
use crate::error::{OrmError, Result};
use crate::value::{DbValue, SqlValue};
use std::collections::HashMap;

/// A struct mapped to a table
pub trait Record: Sized {
    /// Table name (the type's name, verbatim)
    const TABLE: &'static str;

    /// Declared field names in declaration order
    const FIELDS: &'static [&'static str];

    /// Build an instance from one result row via the name index
    ///
    /// # Errors
    ///
    /// [`OrmError::ColumnMismatch`] for a field with no column,
    /// [`OrmError::NullValueForNonOptional`],
    /// [`OrmError::TypeMismatch`] or
    /// [`OrmError::InvalidEnumOrdinal`] from field conversion.
    fn from_row(row: &Row, columns: &ColumnIndex) -> Result<Self>;

    /// Render every field to a statement value, in field order
    fn sql_values(&self) -> Vec<(&'static str, SqlValue)>;

    /// The primary key; zero means "not yet assigned"
    fn id(&self) -> i64;

    /// Overwrite the primary key (used after an insert assigns one)
    fn set_id(&mut self, id: i64);
}

/// Column-name to result-index map
///
/// Built once per result set; on duplicate column names the first
/// occurrence wins.
pub struct ColumnIndex {
    map: HashMap<String, usize>,
    count: usize,
}

impl ColumnIndex {
    /// Build the index from a result's column metadata
    #[must_use]
    pub fn from_result(result: &ResultSet) -> Self {
        let mut map = HashMap::new();
        for (index, name) in result.columns().iter().enumerate() {
            map.entry(name.clone()).or_insert(index);
        }
        Self {
            map,
            count: result.column_count(),
        }
    }

    /// Result index for a column name
    #[must_use]
    pub fn index_of(&self, column: &str) -> Option<usize> {
        self.map.get(column).copied()
    }

    /// Number of columns in the underlying result
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.count
    }
}

/// Conversion from a result cell into a field value
pub trait FromColumn: Sized {
    /// Convert the cell at `index`, named `column`
    ///
    /// # Errors
    ///
    /// [`OrmError::NullValueForNonOptional`] for NULL into a
    /// non-optional type, [`OrmError::TypeMismatch`] for a storage class
    /// the target cannot take.
    fn from_column(row: &Row, index: usize, column: &str) -> Result<Self>;
}

fn null_error(column: &str) -> OrmError {
    OrmError::NullValueForNonOptional {
        column: column.to_string(),
    }
}

fn type_error(column: &str, expected: &'static str) -> OrmError {
    OrmError::TypeMismatch {
        column: column.to_string(),
        expected,
    }
}

impl FromColumn for i64 {
    fn from_column(row: &Row, index: usize, column: &str) -> Result<Self> {
        if row.is_null(index) {
            return Err(null_error(column));
        }
        match row.value(index) {
            Some(DbValue::Int(v)) => Ok(*v),
            _ => Err(type_error(column, "integer")),
        }
    }
}

impl FromColumn for i32 {
    fn from_column(row: &Row, index: usize, column: &str) -> Result<Self> {
        let wide = i64::from_column(row, index, column)?;
        Self::try_from(wide).map_err(|_| type_error(column, "32-bit integer"))
    }
}

impl FromColumn for f64 {
    #[allow(clippy::cast_precision_loss)]
    fn from_column(row: &Row, index: usize, column: &str) -> Result<Self> {
        if row.is_null(index) {
            return Err(null_error(column));
        }
        match row.value(index) {
            Some(DbValue::Float(v)) => Ok(*v),
            Some(DbValue::Int(v)) => Ok(*v as Self),
            _ => Err(type_error(column, "float")),
        }
    }
}

impl FromColumn for bool {
    fn from_column(row: &Row, index: usize, column: &str) -> Result<Self> {
        let wide = i64::from_column(row, index, column).map_err(|e| match e {
            OrmError::TypeMismatch { column, .. } => OrmError::TypeMismatch {
                column,
                expected: "boolean",
            },
            other => other,
        })?;
        Ok(wide != 0)
    }
}

impl FromColumn for String {
    fn from_column(row: &Row, index: usize, column: &str) -> Result<Self> {
        if row.is_null(index) {
            return Err(null_error(column));
        }
        match row.value(index) {
            Some(DbValue::Text(s)) => Ok(s.clone()),
            _ => Err(type_error(column, "text")),
        }
    }
}

impl<T: FromColumn> FromColumn for Option<T> {
    fn from_column(row: &Row, index: usize, column: &str) -> Result<Self> {
        if row.is_null(index) {
            return Ok(None);
        }
        T::from_column(row, index, column).map(Some)
    }
}

/// Conversion from a field value into a statement value
pub trait ToColumn {
    /// Render this value for statement substitution
    fn to_column(&self) -> SqlValue;
}

impl ToColumn for i64 {
    fn to_column(&self) -> SqlValue {
        SqlValue::Int(*self)
    }
}

impl ToColumn for i32 {
    fn to_column(&self) -> SqlValue {
        SqlValue::Int(i64::from(*self))
    }
}

impl ToColumn for f64 {
    fn to_column(&self) -> SqlValue {
        SqlValue::Float(*self)
    }
}

impl ToColumn for bool {
    fn to_column(&self) -> SqlValue {
        SqlValue::Bool(*self)
    }
}

impl ToColumn for String {
    fn to_column(&self) -> SqlValue {
        SqlValue::Text(self.clone())
    }
}

impl<T: ToColumn> ToColumn for Option<T> {
    fn to_column(&self) -> SqlValue {
        match self {
            Some(v) => v.to_column(),
            None => SqlValue::Null,
        }
    }
}

/// Enums stored by 0-based declaration ordinal
pub trait Ordinal: Sized {
    /// This variant's ordinal
    fn ordinal(&self) -> i64;

    /// Variant for an ordinal, `None` when out of range
    fn from_ordinal(ordinal: i64) -> Option<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;

    async fn one_row_result(sql: &str) -> (Row, ColumnIndex) {
        let mut db = Database::open(":memory:").await.unwrap();
        let mut result = db.query(sql).await.unwrap();
        let index = ColumnIndex::from_result(&result);
        (result.next_row().unwrap(), index)
    }

    #[tokio::test]
    async fn test_from_column_primitives() {
        let (row, index) =
            one_row_result("SELECT 7 AS n, 2.5 AS f, 'hi' AS s, 1 AS b").await;
        assert_eq!(index.column_count(), 4);

        let n = i64::from_column(&row, index.index_of("n").unwrap(), "n").unwrap();
        assert_eq!(n, 7);
        let f = f64::from_column(&row, index.index_of("f").unwrap(), "f").unwrap();
        assert!((f - 2.5).abs() < f64::EPSILON);
        let s = String::from_column(&row, index.index_of("s").unwrap(), "s").unwrap();
        assert_eq!(s, "hi");
        let b = bool::from_column(&row, index.index_of("b").unwrap(), "b").unwrap();
        assert!(b);
    }

    #[tokio::test]
    async fn test_null_into_non_optional_fails() {
        let (row, _) = one_row_result("SELECT NULL AS n").await;
        let err = i64::from_column(&row, 0, "n").unwrap_err();
        assert!(matches!(
            err,
            OrmError::NullValueForNonOptional { column } if column == "n"
        ));
    }

    #[tokio::test]
    async fn test_null_into_optional_is_none() {
        let (row, _) = one_row_result("SELECT NULL AS n").await;
        let value: Option<i64> = Option::from_column(&row, 0, "n").unwrap();
        assert_eq!(value, None);

        let (row, _) = one_row_result("SELECT 5 AS n").await;
        let value: Option<i64> = Option::from_column(&row, 0, "n").unwrap();
        assert_eq!(value, Some(5));
    }

    #[tokio::test]
    async fn test_type_mismatch_is_loud() {
        let (row, _) = one_row_result("SELECT 'text' AS n").await;
        let err = i64::from_column(&row, 0, "n").unwrap_err();
        assert!(matches!(err, OrmError::TypeMismatch { .. }));
    }

    #[tokio::test]
    async fn test_narrowing_overflow_fails() {
        let (row, _) = one_row_result("SELECT 5000000000 AS n").await;
        let err = i32::from_column(&row, 0, "n").unwrap_err();
        assert!(matches!(err, OrmError::TypeMismatch { .. }));
    }

    #[tokio::test]
    async fn test_column_index_first_occurrence_wins() {
        let mut db = Database::open(":memory:").await.unwrap();
        let result = db.query("SELECT 1 AS x, 2 AS x").await.unwrap();
        let index = ColumnIndex::from_result(&result);
        assert_eq!(index.index_of("x"), Some(0));
        assert_eq!(index.column_count(), 2);
    }

    #[test]
    fn test_to_column_values() {
        assert_eq!(5_i64.to_column(), SqlValue::Int(5));
        assert_eq!(5_i32.to_column(), SqlValue::Int(5));
        assert_eq!(true.to_column(), SqlValue::Bool(true));
        assert_eq!("x".to_string().to_column(), SqlValue::Text("x".to_string()));
        assert_eq!(None::<i64>.to_column(), SqlValue::Null);
        assert_eq!(Some(3_i64).to_column(), SqlValue::Int(3));
    }
}
