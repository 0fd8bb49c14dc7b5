//! Table-based migration lock
//!
//! A run holds the lock while it owns the single row of
//! `harbormaster_migrations_lock`. Acquisition is an `INSERT ... ON CONFLICT DO
//! NOTHING` against the primary key, so exactly one contender's insert lands.

use crate::migration::MigrationError;
use crate::{HarborExecutor, Value};
use std::time::{Duration, Instant};

/// Name of the lock table
pub const LOCK_TABLE: &str = "harbormaster_migrations_lock";

/// Default time to wait for another run to finish
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(60);

const POLL_INTERVAL: Duration = Duration::from_millis(100);

// Per-attempt cap so a wedged INSERT cannot outlive the overall timeout.
const SET_STATEMENT_TIMEOUT_SQL: &str = "SET statement_timeout = '5s'";
const RESET_STATEMENT_TIMEOUT_SQL: &str = "RESET statement_timeout";

pub(crate) const CREATE_LOCK_TABLE_SQL: &str = r#"
        CREATE TABLE IF NOT EXISTS harbormaster_migrations_lock (
            id INTEGER PRIMARY KEY,
            locked_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            locked_by VARCHAR(255) NOT NULL
        )
    "#;

pub(crate) const ACQUIRE_LOCK_SQL: &str = r#"
        INSERT INTO harbormaster_migrations_lock (id, locked_by)
        VALUES (1, $1)
        ON CONFLICT (id) DO NOTHING
    "#;

pub(crate) const RELEASE_LOCK_SQL: &str = "DELETE FROM harbormaster_migrations_lock WHERE id = 1";

pub(crate) const LOCK_HOLDER_SQL: &str = "SELECT locked_by FROM harbormaster_migrations_lock WHERE id = 1";

/// Lock guard that releases the lock when dropped
pub struct MigrationLockGuard<'a> {
    executor: &'a dyn HarborExecutor,
}

impl<'a> MigrationLockGuard<'a> {
    /// Acquire the migration lock, waiting up to `timeout`
    ///
    /// # Arguments
    ///
    /// * `executor` - The database executor (borrowed for the guard's lifetime)
    /// * `timeout` - Maximum time to wait for another run to finish
    ///
    /// # Returns
    ///
    /// Returns a guard that releases the lock when dropped.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::LockTimeout` if another run still holds the lock
    /// when `timeout` expires, or `MigrationError::Database` on any other failure.
    pub fn acquire(
        executor: &'a dyn HarborExecutor,
        timeout: Duration,
    ) -> Result<Self, MigrationError> {
        acquire_migration_lock(executor, timeout)?;
        Ok(Self { executor })
    }
}

impl Drop for MigrationLockGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = release_migration_lock(self.executor) {
            log::warn!("Failed to release migration lock: {e}");
        }
    }
}

fn lock_owner() -> String {
    format!("harbormaster pid {}", std::process::id())
}

fn is_statement_timeout(message: &str) -> bool {
    message.contains("timeout") || message.contains("canceling statement")
}

/// Acquire the migration lock by inserting the lock row
///
/// Polls every 100ms while another run holds the row. The lock table is created
/// on first use.
///
/// # Arguments
///
/// * `executor` - The database executor
/// * `timeout` - Maximum time to wait for the lock
///
/// # Errors
///
/// Returns `MigrationError::LockTimeout` once `timeout` has elapsed without
/// acquiring the row, or `MigrationError::Database` on any other failure.
pub fn acquire_migration_lock(
    executor: &dyn HarborExecutor,
    timeout: Duration,
) -> Result<(), MigrationError> {
    executor.execute(CREATE_LOCK_TABLE_SQL, &[])?;

    let start = Instant::now();
    let owner = lock_owner();
    // Session-level; undone on every exit path below.
    let _ = executor.execute(SET_STATEMENT_TIMEOUT_SQL, &[]);

    let result = loop {
        match executor.execute(ACQUIRE_LOCK_SQL, &[Value::from(owner.as_str())]) {
            Ok(rows) if rows > 0 => {
                log::debug!("Acquired migration lock as '{owner}'");
                break Ok(());
            }
            Ok(_) => {}
            Err(e) if is_statement_timeout(&e.to_string()) => {
                log::debug!("Lock attempt timed out, retrying: {e}");
            }
            Err(e) => break Err(MigrationError::Database(e)),
        }

        if start.elapsed() >= timeout {
            let holder = lock_holder(executor).unwrap_or(None);
            break Err(MigrationError::LockTimeout(format!(
                "Failed to acquire migration lock within {:.1} seconds (held by {}). \
                 To clear a stale lock: DELETE FROM {LOCK_TABLE} WHERE id = 1",
                timeout.as_secs_f64(),
                holder.as_deref().unwrap_or("unknown"),
            )));
        }
        std::thread::sleep(POLL_INTERVAL);
    };

    let _ = executor.execute(RESET_STATEMENT_TIMEOUT_SQL, &[]);
    result
}

/// Release the migration lock by deleting the lock row
///
/// # Errors
///
/// Returns `MigrationError::Database` if the delete fails.
pub fn release_migration_lock(executor: &dyn HarborExecutor) -> Result<(), MigrationError> {
    executor.execute(RELEASE_LOCK_SQL, &[])?;
    Ok(())
}

/// Check if the migration lock is currently held
///
/// # Returns
///
/// Returns `true` if a lock row exists, whoever holds it.
///
/// # Errors
///
/// Returns `MigrationError::Database` if the lookup fails.
pub fn is_migration_lock_held(executor: &dyn HarborExecutor) -> Result<bool, MigrationError> {
    executor.execute(CREATE_LOCK_TABLE_SQL, &[])?;
    Ok(lock_holder(executor)?.is_some())
}

fn lock_holder(executor: &dyn HarborExecutor) -> Result<Option<String>, MigrationError> {
    let rows = executor.query_all(LOCK_HOLDER_SQL, &[])?;
    match rows.first() {
        Some(row) => Ok(Some(row.get_str("locked_by")?.to_string())),
        None => Ok(None),
    }
}
