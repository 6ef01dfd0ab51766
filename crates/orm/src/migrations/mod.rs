//! Migration System
//!
//! Versioned forward scripts applied exactly once, recorded in a tracking
//! table, and reverted one version at a time through their stored rollback
//! scripts.

pub mod definitions;
pub mod loader;
pub mod manager;
pub mod rollback;
pub mod version;

pub use definitions::{
    checksum, ChecksumDrift, Migration, MigrationConfig, MigrationStatus, RollbackOutcome,
    SchemaVersionRecord,
};
pub use loader::{DirectoryLoader, MigrationSource};
pub use manager::MigrationManager;
pub use version::Version;
