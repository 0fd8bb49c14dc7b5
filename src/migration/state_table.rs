//! Ledger table management
//!
//! The ledger (`harbormaster_migrations`) holds one row per applied migration:
//! id, name, version, insertion time, checksum, metadata, and how long the
//! forward step took.

use crate::migration::{LedgerEntry, MigrationDescriptor};
use crate::{HarborError, HarborExecutor, Value};

/// Name of the ledger table
pub const LEDGER_TABLE: &str = "harbormaster_migrations";

pub(crate) const CREATE_LEDGER_SQL: &str = r#"
        CREATE TABLE IF NOT EXISTS harbormaster_migrations (
            id VARCHAR(255) PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            version VARCHAR(64) NOT NULL,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            checksum VARCHAR(64) NOT NULL,
            metadata JSONB,
            execution_time_ms BIGINT
        )
    "#;

pub(crate) const CREATE_VERSION_INDEX_SQL: &str =
    "CREATE INDEX IF NOT EXISTS idx_harbormaster_migrations_version ON harbormaster_migrations(version)";

pub(crate) const CREATE_APPLIED_AT_INDEX_SQL: &str =
    "CREATE INDEX IF NOT EXISTS idx_harbormaster_migrations_applied_at ON harbormaster_migrations(applied_at)";

// Metadata is bound as text and cast, so no JSON type support is needed in the driver.
pub(crate) const INSERT_ENTRY_SQL: &str = r#"
        INSERT INTO harbormaster_migrations (id, name, version, checksum, metadata, execution_time_ms)
        VALUES ($1, $2, $3, $4, $5::text::jsonb, $6)
    "#;

pub(crate) const DELETE_ENTRY_SQL: &str = "DELETE FROM harbormaster_migrations WHERE id = $1";

pub(crate) const SELECT_ENTRY_SQL: &str = r#"
        SELECT id, name, version, applied_at::text AS applied_at, checksum,
               metadata::text AS metadata, execution_time_ms
        FROM harbormaster_migrations
        WHERE id = $1
    "#;

pub(crate) const SELECT_HISTORY_SQL: &str = r#"
        SELECT id, name, version, applied_at::text AS applied_at, checksum,
               metadata::text AS metadata, execution_time_ms
        FROM harbormaster_migrations
        ORDER BY applied_at DESC
    "#;

/// Initialize the ledger table
///
/// Creates `harbormaster_migrations` and its indexes if they don't exist.
/// Safe to call repeatedly (`IF NOT EXISTS`).
///
/// # Errors
///
/// Returns `HarborError` if any DDL statement fails.
pub fn initialize_state_table(executor: &dyn HarborExecutor) -> Result<(), HarborError> {
    executor.execute(CREATE_LEDGER_SQL, &[])?;
    executor.execute(CREATE_VERSION_INDEX_SQL, &[])?;
    executor.execute(CREATE_APPLIED_AT_INDEX_SQL, &[])?;
    Ok(())
}

/// Insert the ledger row for `descriptor`
///
/// `applied_at` is left to the column default.
///
/// # Arguments
///
/// * `executor` - The database executor (usually the unit's transaction)
/// * `descriptor` - The migration being recorded
/// * `checksum` - Fingerprint stored for later drift checks
/// * `execution_time_ms` - How long the forward step took
///
/// # Errors
///
/// Returns `HarborError` if the insert fails (including a duplicate id).
pub fn insert_entry(
    executor: &dyn HarborExecutor,
    descriptor: &MigrationDescriptor,
    checksum: &str,
    execution_time_ms: i64,
) -> Result<(), HarborError> {
    let params = [
        Value::from(descriptor.id.as_str()),
        Value::from(descriptor.name.as_str()),
        Value::from(descriptor.version.as_str()),
        Value::from(checksum),
        Value::from(descriptor.metadata().to_string()),
        Value::Int(execution_time_ms),
    ];

    let inserted = executor.execute(INSERT_ENTRY_SQL, &params)?;
    if inserted != 1 {
        return Err(HarborError::QueryError(format!(
            "expected to insert one ledger row for '{}', inserted {inserted}",
            descriptor.id
        )));
    }
    Ok(())
}

/// Delete the ledger row for `id`, returning how many rows went away
///
/// # Errors
///
/// Returns `HarborError` if the delete fails.
pub fn delete_entry(executor: &dyn HarborExecutor, id: &str) -> Result<u64, HarborError> {
    executor.execute(DELETE_ENTRY_SQL, &[Value::from(id)])
}

/// Look up the ledger row for `id`
///
/// # Returns
///
/// Returns `None` if the migration has never been applied.
///
/// # Errors
///
/// Returns `HarborError` if the query fails or the row cannot be parsed.
pub fn find_entry(
    executor: &dyn HarborExecutor,
    id: &str,
) -> Result<Option<LedgerEntry>, HarborError> {
    let rows = executor.query_all(SELECT_ENTRY_SQL, &[Value::from(id)])?;
    rows.first().map(LedgerEntry::from_row).transpose()
}

/// All ledger rows, most recently applied first
///
/// # Errors
///
/// Returns `HarborError` if the query fails or a row cannot be parsed.
pub fn query_history(executor: &dyn HarborExecutor) -> Result<Vec<LedgerEntry>, HarborError> {
    let rows = executor.query_all(SELECT_HISTORY_SQL, &[])?;
    rows.iter().map(LedgerEntry::from_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::MemoryExecutor;

    fn descriptor() -> MigrationDescriptor {
        MigrationDescriptor::new("create_users", "Create users", "1.0.0")
            .expect("valid descriptor")
            .with_description("Users table")
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let db = MemoryExecutor::new();
        initialize_state_table(&db).expect("first init");
        initialize_state_table(&db).expect("second init");
        assert!(db.ledger_exists());
    }

    #[test]
    fn test_insert_find_delete_roundtrip() {
        let db = MemoryExecutor::new();
        initialize_state_table(&db).expect("init");

        let d = descriptor();
        insert_entry(&db, &d, &d.checksum(), 7).expect("insert");

        let entry = find_entry(&db, "create_users")
            .expect("query")
            .expect("row present");
        assert_eq!(entry.name, "Create users");
        assert_eq!(entry.checksum, d.checksum());
        assert_eq!(entry.description(), Some("Users table"));
        assert_eq!(entry.execution_time_ms, Some(7));

        assert_eq!(delete_entry(&db, "create_users").expect("delete"), 1);
        assert!(find_entry(&db, "create_users").expect("query").is_none());
    }

    #[test]
    fn test_duplicate_insert_fails() {
        let db = MemoryExecutor::new();
        initialize_state_table(&db).expect("init");
        let d = descriptor();
        insert_entry(&db, &d, &d.checksum(), 1).expect("first insert");
        assert!(insert_entry(&db, &d, &d.checksum(), 1).is_err());
    }

    #[test]
    fn test_queries_fail_without_table() {
        let db = MemoryExecutor::new();
        assert!(find_entry(&db, "create_users").is_err());
        assert!(query_history(&db).is_err());
    }
}
