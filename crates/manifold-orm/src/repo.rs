//! # Repository Operations
//!
//! High-level create/find/update/delete over the statement builder and
//! the row mapper. Absence is `None`/zero rows, never an error; every
//! backend failure surfaces as a typed error for the caller to handle.

use crate::database::Database;
use crate::error::Result;
use crate::mapper::to_records;
use crate::record::Record;
use crate::statement::{delete_sql, insert_sql, select_sql, update_sql};

impl Database {
    /// Insert a record; assigns the generated id back when it was zero
    ///
    /// Returns the record's id after the insert.
    ///
    /// # Errors
    ///
    /// [`crate::OrmError::InvalidArgument`] from the builder's omission
    /// rules, or [`crate::OrmError::Query`] from the backend.
    pub async fn create<T: Record>(&mut self, record: &mut T) -> Result<i64> {
        let sql = insert_sql(record)?;
        let rowid = self.execute_insert(&sql).await?;
        if record.id() == 0 {
            record.set_id(rowid);
        }
        Ok(record.id())
    }

    /// Fetch one record by id; `None` when absent
    ///
    /// # Errors
    ///
    /// [`crate::OrmError::Query`] from the backend or any mapper error.
    pub async fn find<T: Record>(&mut self, id: i64) -> Result<Option<T>> {
        let sql = select_sql::<T>(Some(&format!("id = {id}")));
        let result = self.query(&sql).await?;
        let mut records = to_records::<T>(result)?;
        if records.is_empty() {
            Ok(None)
        } else {
            Ok(Some(records.remove(0)))
        }
    }

    /// Fetch every record of the table
    ///
    /// # Errors
    ///
    /// [`crate::OrmError::Query`] from the backend or any mapper error.
    pub async fn find_all<T: Record>(&mut self) -> Result<Vec<T>> {
        let sql = select_sql::<T>(None);
        let result = self.query(&sql).await?;
        to_records(result)
    }

    /// Fetch records matching a raw WHERE fragment
    ///
    /// # Errors
    ///
    /// [`crate::OrmError::Query`] from the backend or any mapper error.
    pub async fn find_where<T: Record>(&mut self, condition: &str) -> Result<Vec<T>> {
        let sql = select_sql::<T>(Some(condition));
        let result = self.query(&sql).await?;
        to_records(result)
    }

    /// Update a record addressed by its id
    ///
    /// Returns the number of affected rows (zero when the id is gone).
    ///
    /// # Errors
    ///
    /// [`crate::OrmError::InvalidArgument`] for a zero id or an empty
    /// SET list, or [`crate::OrmError::Query`] from the backend.
    pub async fn update<T: Record>(&mut self, record: &T) -> Result<u64> {
        let sql = update_sql(record)?;
        self.execute(&sql).await
    }

    /// Delete a record by id
    ///
    /// Returns the number of affected rows.
    ///
    /// # Errors
    ///
    /// [`crate::OrmError::Query`] from the backend.
    pub async fn delete<T: Record>(&mut self, id: i64) -> Result<u64> {
        let sql = delete_sql::<T>(id);
        self.execute(&sql).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Row;
    use crate::record::{ColumnIndex, FromColumn};
    use crate::value::SqlValue;

    #[derive(Debug, PartialEq, Clone)]
    struct Note {
        id: i64,
        body: Option<String>,
    }

    impl Record for Note {
        const TABLE: &'static str = "Note";
        const FIELDS: &'static [&'static str] = &["id", "body"];

        fn from_row(row: &Row, columns: &ColumnIndex) -> Result<Self> {
            let id_index = columns.index_of("id").unwrap_or(0);
            let body_index = columns.index_of("body").unwrap_or(1);
            Ok(Self {
                id: i64::from_column(row, id_index, "id")?,
                body: Option::from_column(row, body_index, "body")?,
            })
        }

        fn sql_values(&self) -> Vec<(&'static str, SqlValue)> {
            vec![
                ("id", SqlValue::Int(self.id)),
                (
                    "body",
                    self.body
                        .as_ref()
                        .map_or(SqlValue::Null, |b| SqlValue::Text(b.clone())),
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

    async fn note_db() -> Database {
        let mut db = Database::open(":memory:").await.unwrap();
        db.execute("CREATE TABLE Note (id INTEGER PRIMARY KEY, body TEXT)")
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_find_round_trips() {
        let mut db = note_db().await;
        let mut note = Note {
            id: 0,
            body: Some("remember".to_string()),
        };

        let id = db.create(&mut note).await.unwrap();
        assert!(id > 0);
        assert_eq!(note.id, id);

        let found: Note = db.find(id).await.unwrap().unwrap();
        assert_eq!(found, note);
    }

    #[tokio::test]
    async fn test_find_absent_is_none() {
        let mut db = note_db().await;
        let found: Option<Note> = db.find(99).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let mut db = note_db().await;
        let mut note = Note {
            id: 0,
            body: Some("draft".to_string()),
        };
        db.create(&mut note).await.unwrap();

        note.body = Some("final".to_string());
        assert_eq!(db.update(&note).await.unwrap(), 1);

        let found: Note = db.find(note.id).await.unwrap().unwrap();
        assert_eq!(found.body.as_deref(), Some("final"));

        assert_eq!(db.delete::<Note>(note.id).await.unwrap(), 1);
        assert!(db.find::<Note>(note.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_where() {
        let mut db = note_db().await;
        for body in ["alpha", "beta", "alpha"] {
            let mut note = Note {
                id: 0,
                body: Some(body.to_string()),
            };
            db.create(&mut note).await.unwrap();
        }

        let matches: Vec<Note> = db.find_where("body = 'alpha'").await.unwrap();
        assert_eq!(matches.len(), 2);
    }
}
