//! Migrator - Core migration execution engine

use crate::migration::checksum::validate_checksum;
use crate::migration::dependency::validate_dependencies;
use crate::migration::lock::{MigrationLockGuard, DEFAULT_LOCK_TIMEOUT};
use crate::migration::state_table::{find_entry, initialize_state_table, query_history};
use crate::migration::{
    ChecksumDrift, LedgerEntry, Migration, MigrationError, MigrationRegistry, MigrationStatus,
    PendingMigration, SchemaManager,
};
use crate::{HarborExecutor, Transaction};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

/// Progress notifications emitted by [`Migrator::apply_migrations_with`]
#[derive(Clone, Copy)]
pub enum ApplyEvent<'m> {
    /// The migration is about to run
    Applying(&'m dyn Migration),
    /// The migration ran and its ledger row is committed
    Applied {
        migration: &'m dyn Migration,
        execution_time_ms: i64,
    },
    /// The migration was not run (already applied, or its state could not be read)
    Skipped(&'m dyn Migration),
    /// The migration's transaction was rolled back; the batch stops here
    Failed {
        migration: &'m dyn Migration,
        error: &'m MigrationError,
    },
}

/// Outcome of one `apply_migrations` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Ids applied by this call, in apply order
    pub applied: Vec<String>,
    /// Ids skipped by this call, in apply order
    pub skipped: Vec<String>,
}

impl ApplyReport {
    #[must_use]
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }
}

/// Core migration execution engine
///
/// The `Migrator` orchestrates ordering, validation, execution and ledger
/// bookkeeping for the migrations of a [`MigrationRegistry`], against a
/// single executor.
///
/// ```rust,no_run
/// use harbormaster::migration::{MigrationRegistry, Migrator};
/// use harbormaster::{connect, MayPostgresExecutor};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let executor = MayPostgresExecutor::new(connect("postgresql://postgres@localhost/app")?);
/// let registry = MigrationRegistry::new();
///
/// let mut migrator = Migrator::new(&executor, &registry);
/// let report = migrator.apply_migrations()?;
/// println!("applied {} migration(s)", report.applied_count());
/// println!("now at {:?}", migrator.get_current_version());
/// # Ok(())
/// # }
/// ```
pub struct Migrator<'a> {
    executor: &'a dyn HarborExecutor,
    registry: &'a MigrationRegistry,
    lock_timeout: Duration,
    loaded: Option<Vec<&'a dyn Migration>>,
}

impl<'a> Migrator<'a> {
    pub fn new(executor: &'a dyn HarborExecutor, registry: &'a MigrationRegistry) -> Self {
        Self {
            executor,
            registry,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            loaded: None,
        }
    }

    /// How long `apply_migrations` and `rollback_migration` wait for another run
    #[must_use]
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Load the registered migrations in apply order
    ///
    /// Migrations are sorted by version (numerically, segment by segment) and
    /// their declared dependencies are checked. Nothing touches the database.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Discovery` if a dependency is unknown or does
    /// not sort strictly before its dependent.
    pub fn load_migrations(&mut self) -> Result<&[&'a dyn Migration], MigrationError> {
        let registry: &'a MigrationRegistry = self.registry;
        let mut migrations: Vec<&'a dyn Migration> = registry.iter().collect();
        migrations.sort_by(|a, b| {
            a.version()
                .cmp(b.version())
                .then_with(|| a.version().as_str().cmp(b.version().as_str()))
        });

        validate_dependencies(&migrations)?;

        log::debug!("Loaded {} migration(s)", migrations.len());
        let loaded = self.loaded.insert(migrations);
        Ok(loaded.as_slice())
    }

    fn ensure_loaded(&mut self) -> Result<Vec<&'a dyn Migration>, MigrationError> {
        match &self.loaded {
            Some(migrations) => Ok(migrations.clone()),
            None => Ok(self.load_migrations()?.to_vec()),
        }
    }

    /// Loaded migrations in apply order (empty until loaded)
    pub fn migrations(&self) -> &[&'a dyn Migration] {
        self.loaded.as_deref().unwrap_or(&[])
    }

    /// Apply every pending migration in ascending version order
    ///
    /// # Errors
    ///
    /// See [`Migrator::apply_migrations_with`].
    pub fn apply_migrations(&mut self) -> Result<ApplyReport, MigrationError> {
        self.apply_migrations_with(&mut |_| {})
    }

    /// Apply every pending migration, reporting progress to `observer`
    ///
    /// Holds the migration lock for the whole batch. Each migration's forward
    /// step and ledger insert run in one transaction. The batch itself is not
    /// atomic: migrations applied before a failure stay applied, and a later
    /// call resumes with the failed one.
    ///
    /// # Errors
    ///
    /// - `MigrationError::Discovery` if loading fails (before any database work)
    /// - `MigrationError::LockTimeout` if another run holds the lock
    /// - `MigrationError::ExecutionFailed` if a forward step fails
    /// - `MigrationError::LedgerWrite` if the ledger insert fails
    pub fn apply_migrations_with(
        &mut self,
        observer: &mut dyn FnMut(ApplyEvent<'_>),
    ) -> Result<ApplyReport, MigrationError> {
        let migrations = self.ensure_loaded()?;
        let _lock = MigrationLockGuard::acquire(self.executor, self.lock_timeout)?;

        let mut report = ApplyReport::default();
        for migration in migrations {
            if !migration.validate(self.executor) {
                log::debug!(
                    "Skipping migration '{}' (version {})",
                    migration.id(),
                    migration.version()
                );
                observer(ApplyEvent::Skipped(migration));
                report.skipped.push(migration.id().to_string());
                continue;
            }

            observer(ApplyEvent::Applying(migration));
            let execution_time_ms = match self.apply_one(migration) {
                Ok(ms) => ms,
                Err(error) => {
                    observer(ApplyEvent::Failed {
                        migration,
                        error: &error,
                    });
                    return Err(error);
                }
            };
            log::info!(
                "Applied migration '{}' (version {}) in {}ms",
                migration.id(),
                migration.version(),
                execution_time_ms
            );
            observer(ApplyEvent::Applied {
                migration,
                execution_time_ms,
            });
            report.applied.push(migration.id().to_string());
        }

        Ok(report)
    }

    fn apply_one(&self, migration: &dyn Migration) -> Result<i64, MigrationError> {
        let failed = |error: String| MigrationError::ExecutionFailed {
            id: migration.id().to_string(),
            version: migration.version().to_string(),
            error,
        };

        let transaction = self.executor.begin().map_err(|e| failed(e.to_string()))?;
        let start = Instant::now();

        let manager = SchemaManager::new(transaction.as_executor());
        if let Err(e) = migration.up(&manager) {
            rollback_quietly(transaction, migration);
            return Err(failed(e.to_string()));
        }
        let execution_time_ms = i64::try_from(start.elapsed().as_millis()).unwrap_or(i64::MAX);

        if let Err(e) =
            migration.record_migration(transaction.as_executor(), &migration.checksum(), execution_time_ms)
        {
            rollback_quietly(transaction, migration);
            return Err(MigrationError::LedgerWrite {
                id: migration.id().to_string(),
                version: migration.version().to_string(),
                error: e.to_string(),
            });
        }

        transaction
            .commit()
            .map_err(|e| failed(format!("commit failed: {e}")))?;
        Ok(execution_time_ms)
    }

    /// Roll back the migration whose version string is exactly `version`
    ///
    /// The backward step and the ledger delete run in one transaction. A
    /// migration with no ledger row is refused before its backward step runs.
    ///
    /// # Arguments
    ///
    /// * `version` - Version exactly as the migration declares it (`"1.0"` does not match `"1.0.0"`)
    ///
    /// # Returns
    ///
    /// Returns the ledger row that was removed.
    ///
    /// # Errors
    ///
    /// - `MigrationError::NotFound` if no loaded migration has that exact
    ///   version string (no database access happens)
    /// - `MigrationError::NotApplied` if the ledger has no row for it
    /// - `MigrationError::LockTimeout` if another run holds the lock
    /// - `MigrationError::RollbackFailed` if the backward step or the ledger
    ///   delete fails
    pub fn rollback_migration(&mut self, version: &str) -> Result<LedgerEntry, MigrationError> {
        let migration = self
            .ensure_loaded()?
            .into_iter()
            .find(|m| m.version().as_str() == version)
            .ok_or_else(|| MigrationError::NotFound(version.to_string()))?;

        let _lock = MigrationLockGuard::acquire(self.executor, self.lock_timeout)?;
        initialize_state_table(self.executor)?;

        let entry = find_entry(self.executor, migration.id())?.ok_or_else(|| {
            MigrationError::NotApplied {
                id: migration.id().to_string(),
                version: migration.version().to_string(),
            }
        })?;

        let failed = |error: String| MigrationError::RollbackFailed {
            id: migration.id().to_string(),
            version: migration.version().to_string(),
            error,
        };

        let transaction = self.executor.begin().map_err(|e| failed(e.to_string()))?;
        let manager = SchemaManager::new(transaction.as_executor());
        let result = migration
            .down(&manager)
            .and_then(|()| migration.remove_migration_record(transaction.as_executor()));
        if let Err(e) = result {
            rollback_quietly(transaction, migration);
            return Err(failed(e.to_string()));
        }
        transaction
            .commit()
            .map_err(|e| failed(format!("commit failed: {e}")))?;

        log::info!(
            "Rolled back migration '{}' (version {})",
            migration.id(),
            migration.version()
        );
        Ok(entry)
    }

    /// Version of the most recently applied migration, if any
    ///
    /// Best effort: a failed ledger read is logged and reported as `None`.
    pub fn get_current_version(&self) -> Option<String> {
        self.get_migration_history()
            .into_iter()
            .next()
            .map(|entry| entry.version)
    }

    /// Every ledger entry, most recently applied first
    ///
    /// Best effort: creates the ledger if needed, and a failed read is logged
    /// and reported as an empty history.
    pub fn get_migration_history(&self) -> Vec<LedgerEntry> {
        let result = initialize_state_table(self.executor).and_then(|()| query_history(self.executor));
        match result {
            Ok(history) => history,
            Err(e) => {
                log::warn!("Failed to read migration history: {e}");
                Vec::new()
            }
        }
    }

    /// Compare the loaded migrations against the ledger
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Discovery` if loading fails, or
    /// `MigrationError::Database` if the ledger cannot be read.
    pub fn status(&mut self) -> Result<MigrationStatus, MigrationError> {
        let migrations = self.ensure_loaded()?;
        initialize_state_table(self.executor)?;
        let applied = query_history(self.executor)?;

        let by_id: HashMap<&str, &LedgerEntry> =
            applied.iter().map(|entry| (entry.id.as_str(), entry)).collect();
        let registered: HashSet<&str> = migrations.iter().map(|m| m.id()).collect();

        let mut pending = Vec::new();
        let mut drifted = Vec::new();
        for migration in &migrations {
            let checksum = migration.checksum();
            match by_id.get(migration.id()) {
                None => pending.push(PendingMigration {
                    id: migration.id().to_string(),
                    name: migration.name().to_string(),
                    version: migration.version().to_string(),
                    checksum,
                }),
                Some(entry) if entry.checksum != checksum => drifted.push(ChecksumDrift {
                    id: migration.id().to_string(),
                    version: migration.version().to_string(),
                    stored: entry.checksum.clone(),
                    current: checksum,
                }),
                Some(_) => {}
            }
        }

        let orphaned = applied
            .iter()
            .filter(|entry| !registered.contains(entry.id.as_str()))
            .cloned()
            .collect();

        Ok(MigrationStatus::new(applied, pending, orphaned, drifted))
    }

    /// Check every applied migration's stored checksum, in apply order
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::ChecksumMismatch` for the first migration whose
    /// definition changed after it was applied.
    pub fn verify_checksums(&mut self) -> Result<(), MigrationError> {
        let migrations = self.ensure_loaded()?;
        initialize_state_table(self.executor)?;
        let applied = query_history(self.executor)?;

        for migration in migrations {
            if let Some(entry) = applied.iter().find(|entry| entry.id == migration.id()) {
                validate_checksum(migration.descriptor(), &entry.checksum)?;
            }
        }
        Ok(())
    }

    /// Migrations `apply_migrations` would run, in order, without running them
    ///
    /// # Errors
    ///
    /// Same as [`Migrator::status`].
    pub fn dry_run(&mut self) -> Result<Vec<PendingMigration>, MigrationError> {
        Ok(self.status()?.pending)
    }
}

fn rollback_quietly(transaction: Box<dyn Transaction + '_>, migration: &dyn Migration) {
    if let Err(e) = transaction.rollback() {
        log::error!(
            "Failed to roll back transaction for migration '{}': {e}",
            migration.id()
        );
    }
}
