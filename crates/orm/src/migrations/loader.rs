//! Migration sources - produce descriptor lists for `apply_all`
//!
//! [`DirectoryLoader`] reads a flat directory of `.sql` files:
//! - `<version>_<name>.sql` is a forward script; the version is everything
//!   before the first underscore
//! - `<version>_<name>_rollback.sql` is the rollback script for the forward
//!   script with the same stem
//! - a leading `-- depends: 001, 002` comment declares dependencies

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::definitions::Migration;
use crate::error::{MigrationError, OrmError, OrmResult};

const ROLLBACK_SUFFIX: &str = "_rollback";
const DEPENDS_PREFIX: &str = "depends:";

/// Anything that can supply migration descriptors
pub trait MigrationSource {
    /// Descriptors in ascending version order
    fn load(&self) -> OrmResult<Vec<Migration>>;
}

impl MigrationSource for Vec<Migration> {
    fn load(&self) -> OrmResult<Vec<Migration>> {
        let mut migrations = self.clone();
        migrations.sort_by(|a, b| a.version().cmp(b.version()));
        Ok(migrations)
    }
}

/// Loads migrations from `.sql` files in one directory
#[derive(Debug, Clone)]
pub struct DirectoryLoader {
    dir: PathBuf,
}

impl DirectoryLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn sql_files(&self) -> OrmResult<BTreeMap<String, PathBuf>> {
        let mut files = BTreeMap::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|ext| ext.to_str()) != Some("sql") {
                continue;
            }
            match path.file_stem().and_then(|stem| stem.to_str()) {
                Some(stem) => {
                    files.insert(stem.to_string(), path.clone());
                }
                None => warn!(path = %path.display(), "skipping migration file with non UTF-8 name"),
            }
        }

        Ok(files)
    }
}

impl MigrationSource for DirectoryLoader {
    fn load(&self) -> OrmResult<Vec<Migration>> {
        let files = self.sql_files()?;

        let (rollbacks, forwards): (BTreeMap<_, _>, BTreeMap<_, _>) = files
            .into_iter()
            .partition(|(stem, _)| stem.ends_with(ROLLBACK_SUFFIX));

        let mut rollbacks: BTreeMap<String, PathBuf> = rollbacks
            .into_iter()
            .map(|(stem, path)| (stem[..stem.len() - ROLLBACK_SUFFIX.len()].to_string(), path))
            .collect();

        let mut seen = HashSet::new();
        let mut migrations = Vec::with_capacity(forwards.len());

        for (stem, path) in forwards {
            let version = version_prefix(&stem).ok_or_else(|| {
                OrmError::invalid_input(format!("migration file '{}' has no version prefix", path.display()))
            })?;
            if !seen.insert(version.to_string()) {
                return Err(MigrationError::DuplicateVersion(version.to_string()).into());
            }

            let forward_sql = fs::read_to_string(&path)?;
            let dependencies = parse_dependencies(&forward_sql);
            let mut migration = Migration::new(version, forward_sql);

            if let Some(rollback_path) = rollbacks.remove(&stem) {
                migration = migration.with_rollback(fs::read_to_string(&rollback_path)?);
            }
            for dependency in dependencies {
                migration = migration.depends_on(dependency);
            }

            debug!(version = %migration.version(), path = %path.display(), "loaded migration");
            migrations.push(migration);
        }

        for path in rollbacks.values() {
            warn!(path = %path.display(), "rollback script has no matching forward script; ignored");
        }

        migrations.sort_by(|a, b| a.version().cmp(b.version()));
        Ok(migrations)
    }
}

fn version_prefix(stem: &str) -> Option<&str> {
    let version = stem.split_once('_').map_or(stem, |(version, _)| version);
    (!version.is_empty()).then_some(version)
}

/// Dependencies from `-- depends:` lines in the leading comment block
fn parse_dependencies(script: &str) -> Vec<String> {
    script
        .lines()
        .map(str::trim)
        .take_while(|line| line.is_empty() || line.starts_with("--"))
        .filter_map(|line| line.strip_prefix("--"))
        .map(str::trim)
        .filter_map(|comment| {
            let head = comment.get(..DEPENDS_PREFIX.len())?;
            head.eq_ignore_ascii_case(DEPENDS_PREFIX)
                .then(|| &comment[DEPENDS_PREFIX.len()..])
        })
        .flat_map(|list| list.split(','))
        .map(str::trim)
        .filter(|dependency| !dependency.is_empty())
        .map(str::to_string)
        .collect()
}
