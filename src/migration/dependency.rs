//! Dependency validation for a loaded migration set
//!
//! Migrations run in version order, so a declared dependency is only honoured
//! if it sorts strictly before its dependent. Because every edge must point to
//! a lower version, a set that passes this check cannot contain a cycle.

use crate::migration::{Migration, MigrationError};
use std::collections::HashMap;

/// Check every declared dependency of `migrations`
///
/// All problems are collected and reported together.
///
/// # Errors
///
/// Returns `MigrationError::Discovery` listing each dependency that names an
/// unknown id or a migration whose version is not lower than the dependent's.
pub fn validate_dependencies(migrations: &[&dyn Migration]) -> Result<(), MigrationError> {
    let by_id: HashMap<&str, &dyn Migration> =
        migrations.iter().map(|m| (m.id(), *m)).collect();
    let mut errors = Vec::new();

    for migration in migrations {
        for dependency in &migration.descriptor().dependencies {
            match by_id.get(dependency.as_str()) {
                None => errors.push(format!(
                    "Migration '{}' (version {}) depends on '{dependency}', which is not registered",
                    migration.id(),
                    migration.version()
                )),
                Some(target) if target.version() >= migration.version() => errors.push(format!(
                    "Migration '{}' (version {}) depends on '{dependency}' (version {}), \
                     which would not be applied before it",
                    migration.id(),
                    migration.version(),
                    target.version()
                )),
                Some(_) => {}
            }
        }
    }

    if !errors.is_empty() {
        return Err(MigrationError::Discovery(errors.join("\n")));
    }

    Ok(())
}
