//! Schema Validator - read-only introspection of a SQLite schema
//!
//! Each check returns `Ok(())` when everything is present and a
//! [`SchemaError`] naming the missing element otherwise.

use std::collections::HashSet;

use sqlx::SqliteConnection;

use crate::error::{ForeignKeyViolation, OrmResult, SchemaError};

/// Read-only schema checks over a borrowed connection
pub struct SchemaValidator<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> SchemaValidator<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Whether a table exists
    pub async fn table_exists(&mut self, table: &str) -> OrmResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
        )
        .bind(table)
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(exists)
    }

    /// Confirm every named table exists
    pub async fn validate_tables(&mut self, names: &[&str]) -> OrmResult<()> {
        let existing: HashSet<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table'")
                .fetch_all(&mut *self.conn)
                .await?
                .into_iter()
                .collect();

        let missing = missing_from(&existing, names);
        if !missing.is_empty() {
            return Err(SchemaError::MissingTables(missing).into());
        }
        Ok(())
    }

    /// Confirm `table` exists and has every named column
    pub async fn validate_columns(&mut self, table: &str, names: &[&str]) -> OrmResult<()> {
        let existing = self.names_from("SELECT name FROM pragma_table_info(?)", table).await?;
        if existing.is_empty() {
            return Err(SchemaError::MissingTables(vec![table.to_string()]).into());
        }

        let missing = missing_from(&existing, names);
        if !missing.is_empty() {
            return Err(SchemaError::MissingColumns {
                table: table.to_string(),
                columns: missing,
            }
            .into());
        }
        Ok(())
    }

    /// Confirm `table` exists and carries every named index
    pub async fn validate_indexes(&mut self, table: &str, names: &[&str]) -> OrmResult<()> {
        if !self.table_exists(table).await? {
            return Err(SchemaError::MissingTables(vec![table.to_string()]).into());
        }

        let existing = self.names_from("SELECT name FROM pragma_index_list(?)", table).await?;
        let missing = missing_from(&existing, names);
        if !missing.is_empty() {
            return Err(SchemaError::MissingIndexes {
                table: table.to_string(),
                indexes: missing,
            }
            .into());
        }
        Ok(())
    }

    /// Referential integrity across the whole schema
    pub async fn validate_constraints(&mut self) -> OrmResult<()> {
        let rows: Vec<(String, Option<i64>, String, i64)> =
            sqlx::query_as("PRAGMA foreign_key_check")
                .fetch_all(&mut *self.conn)
                .await?;

        if rows.is_empty() {
            return Ok(());
        }

        let violations = rows
            .into_iter()
            .map(|(table, rowid, parent, constraint_index)| ForeignKeyViolation {
                table,
                rowid,
                parent,
                constraint_index,
            })
            .collect();
        Err(SchemaError::ConstraintViolations(violations).into())
    }

    async fn names_from(&mut self, sql: &str, table: &str) -> OrmResult<HashSet<String>> {
        let names: Vec<String> = sqlx::query_scalar(sql)
            .bind(table)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(names.into_iter().collect())
    }
}

fn missing_from(existing: &HashSet<String>, wanted: &[&str]) -> Vec<String> {
    wanted
        .iter()
        .filter(|name| !existing.contains(**name))
        .map(|name| name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrmError;
    use sqlx::Connection;

    async fn memory() -> SqliteConnection {
        let mut conn = SqliteConnection::connect("sqlite::memory:").await.unwrap();
        sqlx::query(
            "CREATE TABLE framework_epics (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
             CREATE TABLE framework_stories (
                 id INTEGER PRIMARY KEY,
                 epic_id INTEGER NOT NULL REFERENCES framework_epics(id),
                 title TEXT
             );
             CREATE INDEX stories_epic_idx ON framework_stories(epic_id);",
        )
        .execute(&mut conn)
        .await
        .unwrap();
        conn
    }

    #[tokio::test]
    async fn test_validate_tables_names_missing() {
        let mut conn = memory().await;
        let mut validator = SchemaValidator::new(&mut conn);

        validator
            .validate_tables(&["framework_epics", "framework_stories"])
            .await
            .unwrap();

        match validator.validate_tables(&["framework_epics", "framework_tasks"]).await {
            Err(OrmError::Schema(SchemaError::MissingTables(missing))) => {
                assert_eq!(missing, vec!["framework_tasks".to_string()]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_validate_columns() {
        let mut conn = memory().await;
        let mut validator = SchemaValidator::new(&mut conn);

        validator
            .validate_columns("framework_stories", &["id", "epic_id"])
            .await
            .unwrap();

        match validator
            .validate_columns("framework_stories", &["title", "status"])
            .await
        {
            Err(OrmError::Schema(SchemaError::MissingColumns { table, columns })) => {
                assert_eq!(table, "framework_stories");
                assert_eq!(columns, vec!["status".to_string()]);
            }
            other => panic!("unexpected result: {other:?}"),
        }

        assert!(matches!(
            validator.validate_columns("nope", &["id"]).await,
            Err(OrmError::Schema(SchemaError::MissingTables(_)))
        ));
    }

    #[tokio::test]
    async fn test_validate_indexes() {
        let mut conn = memory().await;
        let mut validator = SchemaValidator::new(&mut conn);

        validator
            .validate_indexes("framework_stories", &["stories_epic_idx"])
            .await
            .unwrap();

        assert!(matches!(
            validator
                .validate_indexes("framework_stories", &["stories_title_idx"])
                .await,
            Err(OrmError::Schema(SchemaError::MissingIndexes { .. }))
        ));
    }

    #[tokio::test]
    async fn test_validate_constraints_reports_orphans() {
        let mut conn = memory().await;
        SchemaValidator::new(&mut conn).validate_constraints().await.unwrap();

        sqlx::query("PRAGMA foreign_keys = OFF").execute(&mut conn).await.unwrap();
        sqlx::query("INSERT INTO framework_stories (id, epic_id, title) VALUES (1, 42, 'orphan')")
            .execute(&mut conn)
            .await
            .unwrap();

        match SchemaValidator::new(&mut conn).validate_constraints().await {
            Err(OrmError::Schema(SchemaError::ConstraintViolations(violations))) => {
                assert_eq!(violations.len(), 1);
                assert_eq!(violations[0].table, "framework_stories");
                assert_eq!(violations[0].parent, "framework_epics");
                assert_eq!(violations[0].rowid, Some(1));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
