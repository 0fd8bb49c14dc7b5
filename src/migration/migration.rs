//! Migration trait definition

use super::schema_manager::SchemaManager;
use super::state_table::{delete_entry, find_entry, initialize_state_table, insert_entry};
use super::{MigrationDescriptor, Version};
use crate::{HarborError, HarborExecutor};

/// Trait that all migrations must implement
///
/// A unit owns its forward (`up`) and backward (`down`) steps plus its own
/// ledger bookkeeping. The migrator runs `up` followed by `record_migration`
/// (and `down` followed by `remove_migration_record`) on one transaction, so
/// implementations only need to issue their statements through the manager.
pub trait Migration: Send + Sync {
    /// Identity and metadata of this unit
    fn descriptor(&self) -> &MigrationDescriptor;

    /// Apply the migration (forward migration)
    fn up(&self, manager: &SchemaManager<'_>) -> Result<(), HarborError>;

    /// Rollback the migration (reverse migration)
    fn down(&self, manager: &SchemaManager<'_>) -> Result<(), HarborError>;

    fn id(&self) -> &str {
        &self.descriptor().id
    }

    fn name(&self) -> &str {
        &self.descriptor().name
    }

    fn version(&self) -> &Version {
        &self.descriptor().version
    }

    fn checksum(&self) -> String {
        self.descriptor().checksum()
    }

    /// Whether this unit still needs to be applied
    ///
    /// Creates the ledger table if it is missing, then reports `true` only when
    /// no ledger row exists for this id. Any error is logged and reported as
    /// `false`, so a unit whose state cannot be determined is never applied.
    ///
    /// # Arguments
    ///
    /// * `executor` - The database executor
    ///
    /// # Returns
    ///
    /// Returns `true` if the migration should run.
    fn validate(&self, executor: &dyn HarborExecutor) -> bool {
        let result = initialize_state_table(executor).and_then(|()| find_entry(executor, self.id()));
        match result {
            Ok(entry) => entry.is_none(),
            Err(e) => {
                log::warn!(
                    "Validation of migration '{}' (version {}) failed, skipping: {}",
                    self.id(),
                    self.version(),
                    e
                );
                false
            }
        }
    }

    /// Insert this unit's ledger row
    ///
    /// # Arguments
    ///
    /// * `executor` - The executor the forward step ran on
    /// * `checksum` - Fingerprint to store
    /// * `execution_time_ms` - Duration of the forward step
    ///
    /// # Errors
    ///
    /// Returns `HarborError` if the insert fails.
    fn record_migration(
        &self,
        executor: &dyn HarborExecutor,
        checksum: &str,
        execution_time_ms: i64,
    ) -> Result<(), HarborError> {
        insert_entry(executor, self.descriptor(), checksum, execution_time_ms)
    }

    /// Delete this unit's ledger row
    ///
    /// # Errors
    ///
    /// Returns `HarborError` if the delete fails or no row was there to delete.
    fn remove_migration_record(&self, executor: &dyn HarborExecutor) -> Result<(), HarborError> {
        match delete_entry(executor, self.id())? {
            1 => Ok(()),
            n => Err(HarborError::QueryError(format!(
                "expected to delete one ledger row for '{}', deleted {n}",
                self.id()
            ))),
        }
    }
}

/// A migration made of plain SQL statements
///
/// Forward statements run in order on `up`, backward statements in order on
/// `down`.
///
/// ```rust
/// use harbormaster::migration::{Migration, MigrationDescriptor, SqlMigration};
///
/// # fn main() -> Result<(), harbormaster::migration::MigrationError> {
/// let descriptor = MigrationDescriptor::new("create_users_table", "Create users table", "1.0.0")?
///     .with_description("Users with unique email");
///
/// let migration = SqlMigration::new(descriptor)
///     .up_sql("CREATE TABLE users (id SERIAL PRIMARY KEY, email TEXT NOT NULL UNIQUE)")
///     .down_sql("DROP TABLE users");
///
/// assert_eq!(migration.id(), "create_users_table");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SqlMigration {
    descriptor: MigrationDescriptor,
    up: Vec<String>,
    down: Vec<String>,
}

impl SqlMigration {
    #[must_use]
    pub fn new(descriptor: MigrationDescriptor) -> Self {
        Self {
            descriptor,
            up: Vec::new(),
            down: Vec::new(),
        }
    }

    /// Append a forward statement
    #[must_use]
    pub fn up_sql(mut self, sql: impl Into<String>) -> Self {
        self.up.push(sql.into());
        self
    }

    /// Append a backward statement
    #[must_use]
    pub fn down_sql(mut self, sql: impl Into<String>) -> Self {
        self.down.push(sql.into());
        self
    }

    /// Append several forward statements
    #[must_use]
    pub fn up_statements<I, S>(mut self, statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.up.extend(statements.into_iter().map(Into::into));
        self
    }

    /// Append several backward statements
    #[must_use]
    pub fn down_statements<I, S>(mut self, statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.down.extend(statements.into_iter().map(Into::into));
        self
    }

    pub fn up_steps(&self) -> &[String] {
        &self.up
    }

    pub fn down_steps(&self) -> &[String] {
        &self.down
    }
}

fn run_steps(manager: &SchemaManager<'_>, steps: &[String]) -> Result<(), HarborError> {
    for sql in steps {
        manager.execute(sql, &[])?;
    }
    Ok(())
}

impl Migration for SqlMigration {
    fn descriptor(&self) -> &MigrationDescriptor {
        &self.descriptor
    }

    fn up(&self, manager: &SchemaManager<'_>) -> Result<(), HarborError> {
        run_steps(manager, &self.up)
    }

    fn down(&self, manager: &SchemaManager<'_>) -> Result<(), HarborError> {
        run_steps(manager, &self.down)
    }
}
