//! # Statement Builder
//!
//! Builds INSERT/UPDATE/SELECT/DELETE statements from a record's field
//! reflection. Values are substituted directly with single-quote
//! escaping as the injection defense.
//!
//! Omission rules shared by insert and update: a `None` optional is left
//! out so the database default applies, and the `id` field is included
//! only when nonzero - a zero id means "let the database assign one".

use crate::error::{OrmError, Result};
use crate::record::Record;
use crate::value::SqlValue;

/// Build an INSERT statement for a record
///
/// # Errors
///
/// [`OrmError::InvalidArgument`] when no field survives the omission
/// rules (e.g. an all-optional, all-`None` record with a zero id).
pub fn insert_sql<T: Record>(record: &T) -> Result<String> {
    let mut columns = Vec::new();
    let mut values = Vec::new();
    for (name, value) in record.sql_values() {
        if skip_for_write(name, &value) {
            continue;
        }
        columns.push(name);
        values.push(value.to_sql());
    }
    if columns.is_empty() {
        return Err(OrmError::invalid(format!(
            "no fields to insert for {}",
            T::TABLE
        )));
    }
    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        T::TABLE,
        columns.join(", "),
        values.join(", ")
    ))
}

/// Build an UPDATE statement addressing the record's id
///
/// The id never appears in the SET list.
///
/// # Errors
///
/// [`OrmError::InvalidArgument`] when the record's id is zero or no
/// field survives the omission rules.
pub fn update_sql<T: Record>(record: &T) -> Result<String> {
    let id = record.id();
    if id == 0 {
        return Err(OrmError::invalid(format!(
            "cannot update {} without an id",
            T::TABLE
        )));
    }
    let mut assignments = Vec::new();
    for (name, value) in record.sql_values() {
        if name == "id" || value == SqlValue::Null {
            continue;
        }
        assignments.push(format!("{name} = {}", value.to_sql()));
    }
    if assignments.is_empty() {
        return Err(OrmError::invalid(format!(
            "no fields to update for {}",
            T::TABLE
        )));
    }
    Ok(format!(
        "UPDATE {} SET {} WHERE id = {id}",
        T::TABLE,
        assignments.join(", ")
    ))
}

/// Build a SELECT over the record's declared fields
///
/// The column list is explicit and in field order; `condition` is an
/// optional raw WHERE fragment (see [`condition_eq`] for an escaped
/// equality helper).
#[must_use]
pub fn select_sql<T: Record>(condition: Option<&str>) -> String {
    let columns = T::FIELDS.join(", ");
    match condition {
        Some(cond) => format!("SELECT {columns} FROM {} WHERE {cond}", T::TABLE),
        None => format!("SELECT {columns} FROM {}", T::TABLE),
    }
}

/// Build a DELETE addressing one id
#[must_use]
pub fn delete_sql<T: Record>(id: i64) -> String {
    format!("DELETE FROM {} WHERE id = {id}", T::TABLE)
}

/// Escaped equality fragment for use as a WHERE condition
#[must_use]
pub fn condition_eq(column: &str, value: &SqlValue) -> String {
    format!("{column} = {}", value.to_sql())
}

/// Shared omission rules for insert/update value lists
fn skip_for_write(name: &str, value: &SqlValue) -> bool {
    if name == "id" {
        return *value == SqlValue::Int(0);
    }
    *value == SqlValue::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Row;
    use crate::record::ColumnIndex;

    struct Gadget {
        id: i64,
        label: Option<String>,
        weight: Option<f64>,
    }

    impl Record for Gadget {
        const TABLE: &'static str = "Gadget";
        const FIELDS: &'static [&'static str] = &["id", "label", "weight"];

        fn from_row(_row: &Row, _columns: &ColumnIndex) -> Result<Self> {
            unreachable!("builder tests never map rows")
        }

        fn sql_values(&self) -> Vec<(&'static str, SqlValue)> {
            vec![
                ("id", SqlValue::Int(self.id)),
                (
                    "label",
                    self.label
                        .as_ref()
                        .map_or(SqlValue::Null, |l| SqlValue::Text(l.clone())),
                ),
                (
                    "weight",
                    self.weight.map_or(SqlValue::Null, SqlValue::Float),
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

    #[test]
    fn test_insert_omits_zero_id_and_nulls() {
        let gadget = Gadget {
            id: 0,
            label: Some("widget".to_string()),
            weight: None,
        };
        let sql = insert_sql(&gadget).unwrap();
        assert_eq!(sql, "INSERT INTO Gadget (label) VALUES ('widget')");
    }

    #[test]
    fn test_insert_includes_nonzero_id() {
        let gadget = Gadget {
            id: 9,
            label: Some("widget".to_string()),
            weight: Some(1.5),
        };
        let sql = insert_sql(&gadget).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO Gadget (id, label, weight) VALUES (9, 'widget', 1.5)"
        );
    }

    #[test]
    fn test_insert_escapes_quotes() {
        let gadget = Gadget {
            id: 0,
            label: Some("O'Brien's".to_string()),
            weight: None,
        };
        let sql = insert_sql(&gadget).unwrap();
        assert_eq!(sql, "INSERT INTO Gadget (label) VALUES ('O''Brien''s')");
    }

    #[test]
    fn test_insert_with_no_eligible_fields_fails() {
        let gadget = Gadget {
            id: 0,
            label: None,
            weight: None,
        };
        let err = insert_sql(&gadget).unwrap_err();
        assert!(matches!(err, OrmError::InvalidArgument { .. }));
    }

    #[test]
    fn test_update_addresses_id_and_omits_nulls() {
        let gadget = Gadget {
            id: 4,
            label: Some("bolt".to_string()),
            weight: None,
        };
        let sql = update_sql(&gadget).unwrap();
        assert_eq!(sql, "UPDATE Gadget SET label = 'bolt' WHERE id = 4");
    }

    #[test]
    fn test_update_without_id_fails() {
        let gadget = Gadget {
            id: 0,
            label: Some("bolt".to_string()),
            weight: None,
        };
        assert!(matches!(
            update_sql(&gadget),
            Err(OrmError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_update_with_no_eligible_fields_fails() {
        let gadget = Gadget {
            id: 4,
            label: None,
            weight: None,
        };
        assert!(matches!(
            update_sql(&gadget),
            Err(OrmError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_select_with_and_without_condition() {
        assert_eq!(
            select_sql::<Gadget>(None),
            "SELECT id, label, weight FROM Gadget"
        );
        assert_eq!(
            select_sql::<Gadget>(Some("id = 3")),
            "SELECT id, label, weight FROM Gadget WHERE id = 3"
        );
    }

    #[test]
    fn test_delete() {
        assert_eq!(delete_sql::<Gadget>(12), "DELETE FROM Gadget WHERE id = 12");
    }

    #[test]
    fn test_condition_eq_escapes() {
        let cond = condition_eq("name", &SqlValue::Text("O'Brien".to_string()));
        assert_eq!(cond, "name = 'O''Brien'");
    }
}
