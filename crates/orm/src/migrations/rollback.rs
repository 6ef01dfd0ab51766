//! Migration Rollback - reverts a single applied version
//!
//! The stored rollback script and the removal of the tracking row run in one
//! transaction. A version without a stored script is untracked but its schema
//! change stays in place.

use sqlx::{Connection, SqliteConnection};
use tracing::{info, instrument, warn};

use super::definitions::RollbackOutcome;
use super::manager::MigrationManager;
use super::version::Version;
use crate::error::{MigrationError, OrmResult};

impl MigrationManager {
    /// Revert one applied version using the rollback script recorded with it
    ///
    /// Fails with [`MigrationError::NotApplied`] when the version has no
    /// tracking row. A failing rollback script leaves both the schema and the
    /// tracking row untouched.
    #[instrument(skip_all, fields(version = %version))]
    pub async fn rollback(
        &self,
        conn: &mut SqliteConnection,
        version: &Version,
    ) -> OrmResult<RollbackOutcome> {
        let mut tx = conn.begin().await?;
        match self.rollback_in(&mut *tx, version).await {
            Ok(outcome) => {
                tx.commit().await?;
                Ok(outcome)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "failed to roll back rollback transaction");
                }
                Err(err)
            }
        }
    }

    /// Revert the highest applied version, if any
    pub async fn rollback_latest(
        &self,
        conn: &mut SqliteConnection,
    ) -> OrmResult<Option<(Version, RollbackOutcome)>> {
        let Some(version) = self.current_version(conn).await? else {
            return Ok(None);
        };
        let outcome = self.rollback(conn, &version).await?;
        Ok(Some((version, outcome)))
    }

    async fn rollback_in(
        &self,
        conn: &mut SqliteConnection,
        version: &Version,
    ) -> OrmResult<RollbackOutcome> {
        self.ensure_tracking_table(conn)
            .await
            .map_err(|err| self.tracking_error(err))?;
        let record = self
            .find_record(conn, version)
            .await
            .map_err(|err| self.tracking_error(err))?
            .ok_or_else(|| MigrationError::NotApplied(version.to_string()))?;

        let outcome = match record.rollback_sql.as_deref() {
            Some(script) => {
                self.run_script(conn, version, script).await?;
                RollbackOutcome::Reverted
            }
            None => {
                warn!(version = %version, "no rollback script recorded; untracking without reverting schema");
                RollbackOutcome::Untracked
            }
        };

        self.remove_record(conn, version)
            .await
            .map_err(|source| MigrationError::Execution {
                version: version.to_string(),
                source,
            })?;

        info!(version = %version, outcome = ?outcome, "rolled back migration");
        Ok(outcome)
    }
}
