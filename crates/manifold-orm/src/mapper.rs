//! # Row Mapper
//!
//! Materializes typed records from an untyped result set, matching
//! columns to fields strictly by name. The field set and the column set
//! must correspond exactly - a missing field or an extra column is a
//! hard error, so schema drift surfaces at the call site instead of
//! producing partially-populated records.

use crate::database::ResultSet;
use crate::error::{OrmError, Result};
use crate::record::{ColumnIndex, Record};

/// Convert every row of a result into records of type `T`
///
/// Column order never matters: each field is looked up through the
/// name index built from the result metadata.
///
/// # Errors
///
/// [`OrmError::ColumnMismatch`] when the result's columns and `T`'s
/// fields are not a 1:1 match (no records are produced), or any field
/// conversion error from the first offending row.
pub fn to_records<T: Record>(mut result: ResultSet) -> Result<Vec<T>> {
    let index = ColumnIndex::from_result(&result);
    validate_columns::<T>(&index)?;

    let mut records = Vec::with_capacity(result.row_count());
    while let Some(row) = result.next_row() {
        records.push(T::from_row(&row, &index)?);
    }
    Ok(records)
}

/// Enforce the exact field/column correspondence
fn validate_columns<T: Record>(index: &ColumnIndex) -> Result<()> {
    for field in T::FIELDS {
        if index.index_of(field).is_none() {
            return Err(OrmError::ColumnMismatch {
                table: T::TABLE.to_string(),
                detail: format!("no column for field '{field}'"),
            });
        }
    }
    if index.column_count() != T::FIELDS.len() {
        return Err(OrmError::ColumnMismatch {
            table: T::TABLE.to_string(),
            detail: format!(
                "result has {} columns, record declares {} fields",
                index.column_count(),
                T::FIELDS.len()
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{Database, Row};
    use crate::record::FromColumn;
    use crate::value::SqlValue;

    #[derive(Debug, PartialEq)]
    struct Player {
        id: i64,
        name: String,
        score: Option<f64>,
    }

    impl Record for Player {
        const TABLE: &'static str = "Player";
        const FIELDS: &'static [&'static str] = &["id", "name", "score"];

        fn from_row(row: &Row, columns: &ColumnIndex) -> Result<Self> {
            let field = |name: &'static str| {
                columns.index_of(name).ok_or_else(|| OrmError::ColumnMismatch {
                    table: Self::TABLE.to_string(),
                    detail: format!("no column for field '{name}'"),
                })
            };
            Ok(Self {
                id: i64::from_column(row, field("id")?, "id")?,
                name: String::from_column(row, field("name")?, "name")?,
                score: Option::from_column(row, field("score")?, "score")?,
            })
        }

        fn sql_values(&self) -> Vec<(&'static str, SqlValue)> {
            vec![
                ("id", SqlValue::Int(self.id)),
                ("name", SqlValue::Text(self.name.clone())),
                (
                    "score",
                    self.score.map_or(SqlValue::Null, SqlValue::Float),
                ),
            ]
        }

        fn id(&self) -> i64 {
            self.id
        }

        fn set_id(&mut self, id: i64) {
            self.id = id;
        }
    }

    async fn seeded_db() -> Database {
        let mut db = Database::open(":memory:").await.unwrap();
        db.execute("CREATE TABLE Player (id INTEGER PRIMARY KEY, name TEXT, score REAL)")
            .await
            .unwrap();
        db.execute("INSERT INTO Player (name, score) VALUES ('Alice', 9.5)")
            .await
            .unwrap();
        db.execute("INSERT INTO Player (name, score) VALUES ('Bob', NULL)")
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn test_maps_rows_by_name() {
        let mut db = seeded_db().await;
        // column order deliberately differs from field order
        let result = db
            .query("SELECT score, id, name FROM Player ORDER BY id")
            .await
            .unwrap();
        let players: Vec<Player> = to_records(result).unwrap();

        assert_eq!(players.len(), 2);
        assert_eq!(players[0].name, "Alice");
        assert_eq!(players[0].score, Some(9.5));
        assert_eq!(players[1].name, "Bob");
        assert_eq!(players[1].score, None);
    }

    #[tokio::test]
    async fn test_extra_column_is_fatal() {
        let mut db = seeded_db().await;
        let result = db
            .query("SELECT id, name, score, 1 AS extra FROM Player")
            .await
            .unwrap();
        let err = to_records::<Player>(result).unwrap_err();
        assert!(matches!(err, OrmError::ColumnMismatch { .. }));
    }

    #[tokio::test]
    async fn test_missing_column_is_fatal() {
        let mut db = seeded_db().await;
        let result = db.query("SELECT id, name FROM Player").await.unwrap();
        let err = to_records::<Player>(result).unwrap_err();
        match err {
            OrmError::ColumnMismatch { detail, .. } => assert!(detail.contains("score")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_mismatch_on_empty_result_still_fatal() {
        let mut db = seeded_db().await;
        let result = db
            .query("SELECT id, name FROM Player WHERE id > 100")
            .await
            .unwrap();
        assert!(to_records::<Player>(result).is_err());
    }

    #[tokio::test]
    async fn test_null_into_non_optional_field() {
        let mut db = seeded_db().await;
        db.execute("INSERT INTO Player (name, score) VALUES (NULL, 2.0)")
            .await
            .unwrap();
        let result = db.query("SELECT id, name, score FROM Player").await.unwrap();
        let err = to_records::<Player>(result).unwrap_err();
        assert!(matches!(
            err,
            OrmError::NullValueForNonOptional { column } if column == "name"
        ));
    }
}
