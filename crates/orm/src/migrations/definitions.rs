//! Migration Definitions - Core types and structures for migrations
//!
//! Defines the migration descriptor, the persisted tracking record, the
//! status report and the configuration of the tracking table.

use std::env;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::version::Version;
use crate::error::{OrmError, OrmResult};
use crate::security::validate_identifier;

/// Hex-encoded SHA-256 of a script
pub fn checksum(script: &str) -> String {
    hex::encode(Sha256::digest(script.as_bytes()))
}

/// One schema version: forward script, optional rollback script, dependencies
///
/// Immutable once built; the checksum is computed from the forward script at
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Migration {
    version: Version,
    forward_sql: String,
    rollback_sql: Option<String>,
    dependencies: Vec<Version>,
    checksum: String,
}

impl Migration {
    pub fn new(version: impl Into<Version>, forward_sql: impl Into<String>) -> Self {
        let forward_sql = forward_sql.into();
        Self {
            version: version.into(),
            checksum: checksum(&forward_sql),
            forward_sql,
            rollback_sql: None,
            dependencies: Vec::new(),
        }
    }

    /// Attach a rollback script. Blank scripts count as no script.
    pub fn with_rollback(mut self, rollback_sql: impl Into<String>) -> Self {
        let rollback_sql = rollback_sql.into();
        self.rollback_sql = if rollback_sql.trim().is_empty() {
            None
        } else {
            Some(rollback_sql)
        };
        self
    }

    /// Declare a dependency on another version. Repeats are ignored.
    pub fn depends_on(mut self, dependency: impl Into<Version>) -> Self {
        let dependency = dependency.into();
        if !self.dependencies.contains(&dependency) {
            self.dependencies.push(dependency);
        }
        self
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn forward_sql(&self) -> &str {
        &self.forward_sql
    }

    pub fn rollback_sql(&self) -> Option<&str> {
        self.rollback_sql.as_deref()
    }

    pub fn dependencies(&self) -> &[Version] {
        &self.dependencies
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }
}

/// A row of the tracking table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaVersionRecord {
    pub version: Version,
    pub applied_at: DateTime<Utc>,
    pub applied_by: String,
    pub rollback_sql: Option<String>,
    pub checksum: Option<String>,
}

/// Applied/pending split of a descriptor set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    /// Highest applied version, `None` when nothing is applied
    pub current_version: Option<Version>,
    pub applied: Vec<Version>,
    pub pending: Vec<Version>,
    pub total: usize,
}

/// What a rollback did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RollbackOutcome {
    /// The rollback script ran and the record was removed
    Reverted,
    /// No rollback script was stored; the record was removed but the schema
    /// change is still in place
    Untracked,
}

/// An applied version whose stored checksum differs from its descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChecksumDrift {
    pub version: Version,
    pub recorded: Option<String>,
    pub current: String,
}

/// Configuration for the migration system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationConfig {
    /// Table name for tracking migrations
    pub tracking_table: String,
    /// Value written to `applied_by`
    pub applied_by: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            tracking_table: "schema_migrations".to_string(),
            applied_by: "system".to_string(),
        }
    }
}

impl MigrationConfig {
    pub const TABLE_ENV: &'static str = "STRATA_MIGRATIONS_TABLE";
    pub const APPLIED_BY_ENV: &'static str = "STRATA_APPLIED_BY";

    /// Load from `STRATA_MIGRATIONS_TABLE` / `STRATA_APPLIED_BY`, falling back to defaults
    pub fn from_env() -> OrmResult<Self> {
        let defaults = Self::default();
        let config = Self {
            tracking_table: env::var(Self::TABLE_ENV).unwrap_or(defaults.tracking_table),
            applied_by: env::var(Self::APPLIED_BY_ENV).unwrap_or(defaults.applied_by),
        };
        config.validate()?;
        Ok(config)
    }

    /// The tracking table name is spliced into SQL, so it must be a plain identifier
    pub fn validate(&self) -> OrmResult<()> {
        validate_identifier(&self.tracking_table)?;
        if self.applied_by.trim().is_empty() {
            return Err(OrmError::invalid_input("applied_by cannot be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_is_deterministic_sha256() {
        let migration = Migration::new("001", "CREATE TABLE widgets(id INTEGER PRIMARY KEY)");
        assert_eq!(migration.checksum().len(), 64);
        assert_eq!(
            migration.checksum(),
            Migration::new("999", "CREATE TABLE widgets(id INTEGER PRIMARY KEY)").checksum()
        );
        assert_ne!(migration.checksum(), checksum("CREATE TABLE gadgets(id INTEGER)"));
        assert_eq!(
            checksum(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_builder_methods() {
        let migration = Migration::new("003", "ALTER TABLE widgets ADD COLUMN label TEXT")
            .with_rollback("   ")
            .depends_on("001")
            .depends_on("002")
            .depends_on("001");

        assert_eq!(migration.rollback_sql(), None);
        assert_eq!(migration.dependencies(), &[Version::from("001"), Version::from("002")]);
    }

    #[test]
    fn test_config_validation() {
        assert!(MigrationConfig::default().validate().is_ok());

        let bad_table = MigrationConfig {
            tracking_table: "schema_migrations; DROP TABLE users".to_string(),
            ..Default::default()
        };
        assert!(matches!(bad_table.validate(), Err(OrmError::Security(_))));

        let bad_actor = MigrationConfig {
            applied_by: " ".to_string(),
            ..Default::default()
        };
        assert!(matches!(bad_actor.validate(), Err(OrmError::InvalidInput(_))));
    }
}
