//! Migration registry
//!
//! The set of migrations a program knows about is built explicitly at startup:
//!
//! ```rust
//! use harbormaster::migration::{MigrationDescriptor, MigrationRegistry, SqlMigration};
//!
//! # fn main() -> Result<(), harbormaster::migration::MigrationError> {
//! let mut registry = MigrationRegistry::new();
//! registry.register(Box::new(
//!     SqlMigration::new(MigrationDescriptor::new("create_users", "Create users", "1.0.0")?)
//!         .up_sql("CREATE TABLE users (id SERIAL PRIMARY KEY)")
//!         .down_sql("DROP TABLE users"),
//! ))?;
//! assert!(registry.is_registered("1.0.0"));
//! # Ok(())
//! # }
//! ```

use crate::migration::version::compare_versions;
use crate::migration::{Migration, MigrationError};
use std::collections::HashMap;

/// Registered migrations, keyed by their version string as written
#[derive(Default)]
pub struct MigrationRegistry {
    migrations: HashMap<String, Box<dyn Migration>>,
}

impl MigrationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a migration
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Discovery` if a migration with the same version
    /// string or the same id is already registered.
    pub fn register(&mut self, migration: Box<dyn Migration>) -> Result<(), MigrationError> {
        let version = migration.version().as_str().to_string();

        if let Some(existing) = self.migrations.get(&version) {
            return Err(MigrationError::Discovery(format!(
                "Migration '{}' uses version {version}, which is already registered by '{}'",
                migration.id(),
                existing.id()
            )));
        }
        if let Some(existing) = self.migrations.values().find(|m| m.id() == migration.id()) {
            return Err(MigrationError::Discovery(format!(
                "Migration id '{}' is registered twice (versions {} and {version})",
                migration.id(),
                existing.version()
            )));
        }

        log::debug!("Registered migration '{}' (version {version})", migration.id());
        self.migrations.insert(version, migration);
        Ok(())
    }

    /// Get a migration by its exact version string
    #[must_use]
    pub fn get(&self, version: &str) -> Option<&dyn Migration> {
        self.migrations.get(version).map(AsRef::as_ref)
    }

    #[must_use]
    pub fn is_registered(&self, version: &str) -> bool {
        self.migrations.contains_key(version)
    }

    /// Registered version strings in ascending version order
    #[must_use]
    pub fn versions(&self) -> Vec<&str> {
        let mut versions: Vec<&str> = self.migrations.keys().map(String::as_str).collect();
        versions.sort_by(|a, b| compare_versions(a, b).then_with(|| a.cmp(b)));
        versions
    }

    /// Remove and return the migration registered under `version`
    pub fn unregister(&mut self, version: &str) -> Option<Box<dyn Migration>> {
        self.migrations.remove(version)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Registered migrations in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = &dyn Migration> {
        self.migrations.values().map(AsRef::as_ref)
    }
}

impl std::fmt::Debug for MigrationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationRegistry")
            .field("versions", &self.versions())
            .finish()
    }
}
