//! Migration Manager - applies migrations and maintains the tracking table
//!
//! `apply_all` runs inside a single transaction on the caller's connection:
//! every pending migration is applied and recorded, or none is.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::{Connection, Row, SqliteConnection};
use tracing::{debug, info, instrument, warn};

use super::definitions::{
    ChecksumDrift, Migration, MigrationConfig, MigrationStatus, SchemaVersionRecord,
};
use super::version::Version;
use crate::error::{MigrationError, OrmError, OrmResult};
use crate::schema::SchemaValidator;

/// Migration manager. Holds configuration only; the connection is passed
/// into every call.
#[derive(Debug, Clone, Default)]
pub struct MigrationManager {
    config: MigrationConfig,
}

impl MigrationManager {
    /// Create a new migration manager with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new migration manager with custom configuration
    pub fn with_config(config: MigrationConfig) -> OrmResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Get the configuration
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Highest applied version, or `None` when nothing is applied
    pub async fn current_version(&self, conn: &mut SqliteConnection) -> OrmResult<Option<Version>> {
        self.ensure_tracking_table(conn).await?;
        let versions = self.applied_versions(conn).await?;
        Ok(versions.into_iter().max())
    }

    /// Tracking records in ascending version order
    pub async fn applied(&self, conn: &mut SqliteConnection) -> OrmResult<Vec<SchemaVersionRecord>> {
        self.ensure_tracking_table(conn).await?;
        let mut records = self.fetch_records(conn).await?;
        records.sort_by(|a, b| a.version.cmp(&b.version));
        Ok(records)
    }

    /// Diff the known descriptors against the tracking table
    pub async fn status(
        &self,
        conn: &mut SqliteConnection,
        migrations: &[Migration],
    ) -> OrmResult<MigrationStatus> {
        self.ensure_tracking_table(conn).await?;
        let applied_versions = self.applied_versions(conn).await?;

        let mut known: Vec<&Version> = migrations.iter().map(Migration::version).collect();
        known.sort();
        known.dedup();

        let total = known.len();
        let (applied, pending): (Vec<&Version>, Vec<&Version>) = known
            .into_iter()
            .partition(|version| applied_versions.contains(*version));

        Ok(MigrationStatus {
            current_version: applied_versions.iter().max().cloned(),
            applied: applied.into_iter().cloned().collect(),
            pending: pending.into_iter().cloned().collect(),
            total,
        })
    }

    /// Apply every pending migration in ascending version order
    ///
    /// Returns the versions applied by this call. On any failure the whole
    /// call is rolled back and the error names the offending version.
    #[instrument(skip_all, fields(migrations = migrations.len()))]
    pub async fn apply_all(
        &self,
        conn: &mut SqliteConnection,
        migrations: &[Migration],
    ) -> OrmResult<Vec<Version>> {
        let mut ordered: Vec<&Migration> = migrations.iter().collect();
        ordered.sort_by(|a, b| a.version().cmp(b.version()));
        if let Some(pair) = ordered.windows(2).find(|pair| pair[0].version() == pair[1].version()) {
            return Err(MigrationError::DuplicateVersion(pair[0].version().to_string()).into());
        }

        let mut tx = conn.begin().await?;
        match self.apply_pending(&mut *tx, &ordered).await {
            Ok(applied) => {
                tx.commit().await?;
                if applied.is_empty() {
                    debug!("no pending migrations");
                } else {
                    info!(count = applied.len(), "migrations committed");
                }
                Ok(applied)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "failed to roll back migration transaction");
                }
                warn!(error = %err, "migration run rolled back");
                Err(err)
            }
        }
    }

    async fn apply_pending(
        &self,
        conn: &mut SqliteConnection,
        ordered: &[&Migration],
    ) -> OrmResult<Vec<Version>> {
        self.ensure_tracking_table(conn)
            .await
            .map_err(|err| self.tracking_error(err))?;
        let mut applied = self
            .applied_versions(conn)
            .await
            .map_err(|err| self.tracking_error(err))?;
        let mut newly_applied = Vec::new();

        for migration in ordered {
            let version = migration.version();
            if applied.contains(version) {
                continue;
            }

            if let Some(dependency) = migration
                .dependencies()
                .iter()
                .find(|dependency| !applied.contains(*dependency))
            {
                return Err(MigrationError::UnmetDependency {
                    version: version.to_string(),
                    dependency: dependency.to_string(),
                }
                .into());
            }

            self.run_script(conn, version, migration.forward_sql()).await?;
            self.record(conn, migration).await.map_err(|source| MigrationError::Execution {
                version: version.to_string(),
                source,
            })?;

            info!(version = %version, "applied migration");
            applied.insert(version.clone());
            newly_applied.push(version.clone());
        }

        Ok(newly_applied)
    }

    /// Applied versions whose stored checksum no longer matches the descriptor
    ///
    /// Read-only; `apply_all` does not consult it.
    pub async fn checksum_drift(
        &self,
        conn: &mut SqliteConnection,
        migrations: &[Migration],
    ) -> OrmResult<Vec<ChecksumDrift>> {
        let records = self.applied(conn).await?;

        let drift = records
            .into_iter()
            .filter_map(|record| {
                let migration = migrations.iter().find(|m| *m.version() == record.version)?;
                if record.checksum.as_deref() == Some(migration.checksum()) {
                    return None;
                }
                Some(ChecksumDrift {
                    version: record.version,
                    recorded: record.checksum,
                    current: migration.checksum().to_string(),
                })
            })
            .collect();

        Ok(drift)
    }

    /// Execute a migration script as written
    ///
    /// The script goes to SQLite untouched, which steps through every
    /// statement itself, trigger bodies included.
    pub(crate) async fn run_script(
        &self,
        conn: &mut SqliteConnection,
        version: &Version,
        script: &str,
    ) -> OrmResult<()> {
        debug!(version = %version, bytes = script.len(), "executing migration script");
        sqlx::query(script)
            .persistent(false)
            .execute(&mut *conn)
            .await
            .map_err(|source| MigrationError::Execution {
                version: version.to_string(),
                source,
            })?;
        Ok(())
    }

    /// Attribute a storage failure to the tracking table
    pub(crate) fn tracking_error(&self, err: OrmError) -> OrmError {
        match err {
            OrmError::Database(source) => MigrationError::Tracking {
                table: self.config.tracking_table.clone(),
                source,
            }
            .into(),
            other => other,
        }
    }

    /// Create the tracking table if it does not exist yet
    pub(crate) async fn ensure_tracking_table(&self, conn: &mut SqliteConnection) -> OrmResult<()> {
        if SchemaValidator::new(&mut *conn)
            .table_exists(&self.config.tracking_table)
            .await?
        {
            return Ok(());
        }

        sqlx::query(&self.create_tracking_table_sql())
            .execute(&mut *conn)
            .await?;
        info!(table = %self.config.tracking_table, "created migration tracking table");
        Ok(())
    }

    pub(crate) async fn applied_versions(
        &self,
        conn: &mut SqliteConnection,
    ) -> OrmResult<HashSet<Version>> {
        let sql = format!("SELECT version FROM {}", self.config.tracking_table);
        let versions: Vec<String> = sqlx::query_scalar(&sql).fetch_all(&mut *conn).await?;
        Ok(versions.into_iter().map(Version::from).collect())
    }

    pub(crate) async fn find_record(
        &self,
        conn: &mut SqliteConnection,
        version: &Version,
    ) -> OrmResult<Option<SchemaVersionRecord>> {
        let sql = format!("{} WHERE version = ?", self.select_records_sql());
        let row = sqlx::query(&sql)
            .bind(version.as_str())
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row.map(|row| record_from_row(&row)).transpose()?)
    }

    async fn fetch_records(&self, conn: &mut SqliteConnection) -> OrmResult<Vec<SchemaVersionRecord>> {
        let rows = sqlx::query(&self.select_records_sql())
            .fetch_all(&mut *conn)
            .await?;
        Ok(rows
            .iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn record(&self, conn: &mut SqliteConnection, migration: &Migration) -> Result<(), sqlx::Error> {
        sqlx::query(&self.record_migration_sql())
            .bind(migration.version().as_str())
            .bind(Utc::now())
            .bind(self.config.applied_by.as_str())
            .bind(migration.rollback_sql())
            .bind(migration.checksum())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub(crate) async fn remove_record(
        &self,
        conn: &mut SqliteConnection,
        version: &Version,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(&self.remove_migration_sql())
            .bind(version.as_str())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// SQL to create the migrations tracking table
    pub fn create_tracking_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
                version TEXT PRIMARY KEY,\n    \
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,\n    \
                applied_by TEXT NOT NULL DEFAULT 'system',\n    \
                rollback_sql TEXT NULL,\n    \
                checksum TEXT\n\
            )",
            self.config.tracking_table
        )
    }

    fn select_records_sql(&self) -> String {
        format!(
            "SELECT version, applied_at, applied_by, rollback_sql, checksum FROM {}",
            self.config.tracking_table
        )
    }

    fn record_migration_sql(&self) -> String {
        format!(
            "INSERT INTO {} (version, applied_at, applied_by, rollback_sql, checksum) VALUES (?, ?, ?, ?, ?)",
            self.config.tracking_table
        )
    }

    fn remove_migration_sql(&self) -> String {
        format!("DELETE FROM {} WHERE version = ?", self.config.tracking_table)
    }
}

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<SchemaVersionRecord, sqlx::Error> {
    Ok(SchemaVersionRecord {
        version: Version::from(row.try_get::<String, _>("version")?),
        applied_at: row.try_get::<DateTime<Utc>, _>("applied_at")?,
        applied_by: row.try_get("applied_by")?,
        rollback_sql: row.try_get("rollback_sql")?,
        checksum: row.try_get("checksum")?,
    })
}
