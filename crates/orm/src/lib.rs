//! # strata-orm: schema migrations and a validated query builder for SQLite
//!
//! Two independent halves share one connection model: the caller owns a
//! `sqlx::SqliteConnection` and lends it to each call.
//!
//! - [`migrations`] applies versioned scripts in order inside one transaction,
//!   records them in a tracking table and reverts them on request.
//! - [`query`] builds SELECT/INSERT/UPDATE/DELETE statements whose table and
//!   column names are checked against an [`AllowList`] and whose values are
//!   always bound as parameters.
//!
//! ```no_run
//! use serde_json::json;
//! use strata_orm::{select, Migration, MigrationManager};
//!
//! # async fn run(conn: &mut sqlx::SqliteConnection) -> strata_orm::OrmResult<()> {
//! let migrations = vec![Migration::new(
//!     "001",
//!     "CREATE TABLE framework_epics (id INTEGER PRIMARY KEY, name TEXT, status TEXT)",
//! )
//! .with_rollback("DROP TABLE framework_epics")];
//! MigrationManager::new().apply_all(conn, &migrations).await?;
//!
//! let epics = select(["id", "name"])
//!     .from_table("framework_epics")
//!     .where_eq("status", json!("active"))
//!     .limit(5)
//!     .execute(conn)
//!     .await?;
//! assert!(epics.rows().len() <= 5);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod executor;
pub mod migrations;
pub mod query;
pub mod schema;
pub mod security;

pub use error::{
    ForeignKeyViolation, MigrationError, OrmError, OrmResult, SchemaError, SecurityError,
};
pub use executor::{execute, execute_batch, execute_transaction, JsonRow, QueryOutcome};
pub use migrations::{
    DirectoryLoader, Migration, MigrationConfig, MigrationManager, MigrationSource,
    MigrationStatus, RollbackOutcome, SchemaVersionRecord, Version,
};
pub use query::{delete, insert_into, select, update, QueryBuilder, QueryOperator};
pub use schema::SchemaValidator;
pub use security::{validate_identifier, AllowList};
