//! In-memory executor for exercising migrations without PostgreSQL
//!
//! [`MemoryExecutor`] understands the ledger, lock and catalog statements the
//! migration layer issues and keeps their state in memory. Every other
//! statement is treated as schema work: it is appended to a log and, for
//! `CREATE TABLE` / `DROP TABLE`, reflected in the set of known tables.
//! Transactions snapshot that state and restore it on rollback.

use crate::migration::lock::{
    ACQUIRE_LOCK_SQL, CREATE_LOCK_TABLE_SQL, LOCK_HOLDER_SQL, RELEASE_LOCK_SQL,
};
use crate::migration::schema_manager::HAS_TABLE_SQL;
use crate::migration::state_table::{
    CREATE_APPLIED_AT_INDEX_SQL, CREATE_LEDGER_SQL, CREATE_VERSION_INDEX_SQL, DELETE_ENTRY_SQL,
    INSERT_ENTRY_SQL, SELECT_ENTRY_SQL, SELECT_HISTORY_SQL,
};
use crate::migration::LedgerEntry;
use crate::{HarborError, HarborExecutor, Row, Transaction, Value};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

// 2024-01-01T00:00:00Z; each ledger insert is stamped one second after the previous.
const BASE_TIMESTAMP: i64 = 1_704_067_200;

#[derive(Debug, Clone)]
struct StoredEntry {
    seq: i64,
    id: String,
    name: String,
    version: String,
    checksum: String,
    metadata: Option<String>,
    execution_time_ms: Option<i64>,
}

impl StoredEntry {
    fn applied_at(&self) -> String {
        (DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(BASE_TIMESTAMP + self.seq)).to_rfc3339()
    }

    fn to_row(&self) -> Row {
        Row::from_pairs([
            ("id", Value::from(self.id.as_str())),
            ("name", Value::from(self.name.as_str())),
            ("version", Value::from(self.version.as_str())),
            ("applied_at", Value::from(self.applied_at())),
            ("checksum", Value::from(self.checksum.as_str())),
            ("metadata", Value::from(self.metadata.clone())),
            ("execution_time_ms", Value::from(self.execution_time_ms)),
        ])
    }
}

/// The part of the database a transaction can roll back
#[derive(Debug, Clone, Default)]
struct DatabaseState {
    ledger_exists: bool,
    entries: Vec<StoredEntry>,
    next_seq: i64,
    lock_table_exists: bool,
    lock_holder: Option<String>,
    tables: BTreeSet<String>,
    schema_log: Vec<String>,
}

#[derive(Debug, Default)]
struct Inner {
    state: DatabaseState,
    statements: Vec<String>,
    fail_on: Vec<String>,
    fail_lookup: Vec<String>,
    in_transaction: bool,
    commits: usize,
    rollbacks: usize,
}

/// In-memory stand-in for a PostgreSQL connection
///
/// Cloning yields another handle to the same database.
#[derive(Debug, Clone, Default)]
pub struct MemoryExecutor {
    inner: Arc<Mutex<Inner>>,
}

fn is(query: &str, statement: &str) -> bool {
    query.trim() == statement.trim()
}

fn missing_relation(name: &str) -> HarborError {
    HarborError::QueryError(format!("relation \"{name}\" does not exist"))
}

fn param_str(params: &[Value], idx: usize) -> Result<String, HarborError> {
    params
        .get(idx)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| HarborError::QueryError(format!("parameter ${} must be text", idx + 1)))
}

/// Table name targeted by a `CREATE TABLE` / `DROP TABLE` statement, unquoted
fn table_name(statement: &str, verb: &str) -> Option<String> {
    let upper = statement.to_ascii_uppercase();
    let rest = upper.strip_prefix(verb)?;
    let offset = statement.len() - rest.len();
    let mut words = statement[offset..].split_whitespace();
    let mut name = words.next()?;
    if name.eq_ignore_ascii_case("IF") {
        // IF [NOT] EXISTS
        words.find(|w| w.eq_ignore_ascii_case("EXISTS"))?;
        name = words.next()?;
    }
    let name = name.split('(').next()?.trim_matches('"');
    (!name.is_empty()).then(|| name.to_string())
}

impl MemoryExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every later statement containing `pattern` fail
    pub fn fail_on(&self, pattern: &str) {
        self.lock().fail_on.push(pattern.to_string());
    }

    /// Make every later ledger lookup of migration `id` fail
    pub fn fail_lookup_of(&self, id: &str) {
        self.lock().fail_lookup.push(id.to_string());
    }

    pub fn clear_failures(&self) {
        let mut inner = self.lock();
        inner.fail_on.clear();
        inner.fail_lookup.clear();
    }

    /// Pretend another process holds the migration lock
    pub fn hold_lock(&self, holder: &str) {
        let mut inner = self.lock();
        inner.state.lock_table_exists = true;
        inner.state.lock_holder = Some(holder.to_string());
    }

    #[must_use]
    pub fn lock_holder(&self) -> Option<String> {
        self.lock().state.lock_holder.clone()
    }

    #[must_use]
    pub fn ledger_exists(&self) -> bool {
        self.lock().state.ledger_exists
    }

    /// Write a ledger row directly, bypassing the migration layer
    pub fn seed_entry(&self, id: &str, name: &str, version: &str, checksum: &str) {
        let mut inner = self.lock();
        let state = &mut inner.state;
        state.ledger_exists = true;
        state.next_seq += 1;
        let seq = state.next_seq;
        state.entries.push(StoredEntry {
            seq,
            id: id.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            checksum: checksum.to_string(),
            metadata: None,
            execution_time_ms: None,
        });
    }

    /// Delete a ledger row directly, bypassing the migration layer
    pub fn remove_entry(&self, id: &str) {
        self.lock().state.entries.retain(|entry| entry.id != id);
    }

    /// Ledger rows in insertion order
    #[must_use]
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.lock()
            .state
            .entries
            .iter()
            .filter_map(|entry| LedgerEntry::from_row(&entry.to_row()).ok())
            .collect()
    }

    /// Every statement received, trimmed, including failed ones
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }

    /// Schema statements that are currently in effect (rolled-back ones are gone)
    #[must_use]
    pub fn schema_log(&self) -> Vec<String> {
        self.lock().state.schema_log.clone()
    }

    #[must_use]
    pub fn has_table(&self, name: &str) -> bool {
        self.lock().state.tables.contains(name)
    }

    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.lock().commits
    }

    #[must_use]
    pub fn rollback_count(&self) -> usize {
        self.lock().rollbacks
    }

    fn check_failure(inner: &mut Inner, query: &str) -> Result<(), HarborError> {
        let trimmed = query.trim().to_string();
        inner.statements.push(trimmed.clone());
        match inner.fail_on.iter().find(|pattern| trimmed.contains(pattern.as_str())) {
            Some(pattern) => Err(HarborError::QueryError(format!(
                "injected failure on statement containing '{pattern}'"
            ))),
            None => Ok(()),
        }
    }

    fn run_execute(&self, query: &str, params: &[Value]) -> Result<u64, HarborError> {
        let mut inner = self.lock();
        Self::check_failure(&mut inner, query)?;
        let state = &mut inner.state;

        if is(query, CREATE_LEDGER_SQL) {
            state.ledger_exists = true;
            Ok(0)
        } else if is(query, CREATE_VERSION_INDEX_SQL) || is(query, CREATE_APPLIED_AT_INDEX_SQL) {
            if state.ledger_exists {
                Ok(0)
            } else {
                Err(missing_relation("harbormaster_migrations"))
            }
        } else if is(query, INSERT_ENTRY_SQL) {
            if !state.ledger_exists {
                return Err(missing_relation("harbormaster_migrations"));
            }
            let id = param_str(params, 0)?;
            if state.entries.iter().any(|entry| entry.id == id) {
                return Err(HarborError::QueryError(format!(
                    "duplicate key value violates unique constraint \"harbormaster_migrations_pkey\": ({id})"
                )));
            }
            state.next_seq += 1;
            let entry = StoredEntry {
                seq: state.next_seq,
                id,
                name: param_str(params, 1)?,
                version: param_str(params, 2)?,
                checksum: param_str(params, 3)?,
                metadata: params.get(4).and_then(Value::as_str).map(str::to_string),
                execution_time_ms: params.get(5).and_then(Value::as_i64),
            };
            state.entries.push(entry);
            Ok(1)
        } else if is(query, DELETE_ENTRY_SQL) {
            if !state.ledger_exists {
                return Err(missing_relation("harbormaster_migrations"));
            }
            let id = param_str(params, 0)?;
            let before = state.entries.len();
            state.entries.retain(|entry| entry.id != id);
            Ok((before - state.entries.len()) as u64)
        } else if is(query, CREATE_LOCK_TABLE_SQL) {
            state.lock_table_exists = true;
            Ok(0)
        } else if is(query, ACQUIRE_LOCK_SQL) {
            if !state.lock_table_exists {
                return Err(missing_relation("harbormaster_migrations_lock"));
            }
            if state.lock_holder.is_some() {
                return Ok(0);
            }
            state.lock_holder = Some(param_str(params, 0)?);
            Ok(1)
        } else if is(query, RELEASE_LOCK_SQL) {
            if !state.lock_table_exists {
                return Err(missing_relation("harbormaster_migrations_lock"));
            }
            Ok(u64::from(state.lock_holder.take().is_some()))
        } else if query.trim_start().starts_with("SET ") || query.trim_start().starts_with("RESET ") {
            Ok(0)
        } else {
            let statement = query.trim().to_string();
            if let Some(name) = table_name(&statement, "CREATE TABLE ") {
                state.tables.insert(name);
            } else if let Some(name) = table_name(&statement, "DROP TABLE ") {
                state.tables.remove(&name);
            }
            state.schema_log.push(statement);
            Ok(0)
        }
    }

    fn run_query(&self, query: &str, params: &[Value]) -> Result<Vec<Row>, HarborError> {
        let mut inner = self.lock();
        Self::check_failure(&mut inner, query)?;
        let state = &inner.state;

        if is(query, SELECT_ENTRY_SQL) {
            if !state.ledger_exists {
                return Err(missing_relation("harbormaster_migrations"));
            }
            let id = param_str(params, 0)?;
            if inner.fail_lookup.contains(&id) {
                return Err(HarborError::QueryError(format!(
                    "injected failure on ledger lookup of '{id}'"
                )));
            }
            Ok(state
                .entries
                .iter()
                .filter(|entry| entry.id == id)
                .map(StoredEntry::to_row)
                .collect())
        } else if is(query, SELECT_HISTORY_SQL) {
            if !state.ledger_exists {
                return Err(missing_relation("harbormaster_migrations"));
            }
            let mut entries: Vec<&StoredEntry> = state.entries.iter().collect();
            entries.sort_by(|a, b| b.seq.cmp(&a.seq));
            Ok(entries.into_iter().map(StoredEntry::to_row).collect())
        } else if is(query, LOCK_HOLDER_SQL) {
            if !state.lock_table_exists {
                return Err(missing_relation("harbormaster_migrations_lock"));
            }
            Ok(state
                .lock_holder
                .iter()
                .map(|holder| Row::from_pairs([("locked_by", Value::from(holder.as_str()))]))
                .collect())
        } else if is(query, HAS_TABLE_SQL) {
            let name = param_str(params, 0)?;
            let present = state.tables.contains(&name)
                || (state.ledger_exists && name == "harbormaster_migrations")
                || (state.lock_table_exists && name == "harbormaster_migrations_lock");
            Ok(vec![Row::from_pairs([("present", Value::Bool(present))])])
        } else {
            Err(HarborError::QueryError(format!(
                "MemoryExecutor cannot answer query: {}",
                query.trim()
            )))
        }
    }

    fn begin_transaction(&self) -> Result<MemoryTransaction, HarborError> {
        let mut inner = self.lock();
        if inner.in_transaction {
            return Err(HarborError::TransactionError(
                "MemoryExecutor does not support nested transactions".to_string(),
            ));
        }
        inner.statements.push("BEGIN".to_string());
        inner.in_transaction = true;
        Ok(MemoryTransaction {
            db: self.clone(),
            snapshot: Some(inner.state.clone()),
        })
    }
}

impl HarborExecutor for MemoryExecutor {
    fn execute(&self, query: &str, params: &[Value]) -> Result<u64, HarborError> {
        self.run_execute(query, params)
    }

    fn query_all(&self, query: &str, params: &[Value]) -> Result<Vec<Row>, HarborError> {
        self.run_query(query, params)
    }

    fn begin(&self) -> Result<Box<dyn Transaction + '_>, HarborError> {
        Ok(Box::new(self.begin_transaction()?))
    }
}

/// Transaction over a [`MemoryExecutor`]
///
/// Dropping it without committing rolls it back.
pub struct MemoryTransaction {
    db: MemoryExecutor,
    snapshot: Option<DatabaseState>,
}

impl MemoryTransaction {
    fn finish(&mut self, commit: bool) -> Result<(), HarborError> {
        let snapshot = self.snapshot.take().ok_or_else(|| {
            HarborError::TransactionError("Transaction is closed".to_string())
        })?;

        let mut inner = self.db.lock();
        inner.in_transaction = false;
        if commit {
            inner.statements.push("COMMIT".to_string());
            inner.commits += 1;
        } else {
            inner.statements.push("ROLLBACK".to_string());
            inner.rollbacks += 1;
            inner.state = snapshot;
        }
        Ok(())
    }
}

impl HarborExecutor for MemoryTransaction {
    fn execute(&self, query: &str, params: &[Value]) -> Result<u64, HarborError> {
        self.db.run_execute(query, params)
    }

    fn query_all(&self, query: &str, params: &[Value]) -> Result<Vec<Row>, HarborError> {
        self.db.run_query(query, params)
    }

    fn begin(&self) -> Result<Box<dyn Transaction + '_>, HarborError> {
        Err(HarborError::TransactionError(
            "MemoryExecutor does not support nested transactions".to_string(),
        ))
    }
}

impl Transaction for MemoryTransaction {
    fn as_executor(&self) -> &dyn HarborExecutor {
        self
    }

    fn commit(mut self: Box<Self>) -> Result<(), HarborError> {
        self.finish(true)
    }

    fn rollback(mut self: Box<Self>) -> Result<(), HarborError> {
        self.finish(false)
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if self.snapshot.is_some() {
            let _ = self.finish(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_parsing() {
        assert_eq!(table_name("CREATE TABLE users (id INT)", "CREATE TABLE "), Some("users".to_string()));
        assert_eq!(
            table_name(r#"CREATE TABLE IF NOT EXISTS "posts" ( "id" integer )"#, "CREATE TABLE "),
            Some("posts".to_string())
        );
        assert_eq!(table_name("drop table if exists users", "DROP TABLE "), Some("users".to_string()));
        assert_eq!(table_name("CREATE INDEX idx ON users(id)", "CREATE TABLE "), None);
    }

    #[test]
    fn test_rollback_restores_state() {
        let db = MemoryExecutor::new();
        db.execute("CREATE TABLE kept (id INT)", &[]).expect("create");

        let tx = db.begin().expect("begin");
        tx.execute("CREATE TABLE discarded (id INT)", &[]).expect("create in tx");
        assert!(db.has_table("discarded"));
        tx.rollback().expect("rollback");

        assert!(db.has_table("kept"));
        assert!(!db.has_table("discarded"));
        assert_eq!(db.schema_log(), vec!["CREATE TABLE kept (id INT)".to_string()]);
        assert_eq!(db.rollback_count(), 1);
    }

    #[test]
    fn test_commit_keeps_state() {
        let db = MemoryExecutor::new();
        let tx = db.begin().expect("begin");
        tx.execute("CREATE TABLE t (id INT)", &[]).expect("create");
        tx.commit().expect("commit");
        assert!(db.has_table("t"));
        assert_eq!(db.commit_count(), 1);
    }

    #[test]
    fn test_dropped_transaction_rolls_back() {
        let db = MemoryExecutor::new();
        {
            let tx = db.begin().expect("begin");
            tx.execute("CREATE TABLE t (id INT)", &[]).expect("create");
        }
        assert!(!db.has_table("t"));
        assert!(db.begin().is_ok());
    }

    #[test]
    fn test_nested_begin_is_refused() {
        let db = MemoryExecutor::new();
        let tx = db.begin().expect("begin");
        assert!(tx.begin().is_err());
        assert!(db.begin().is_err());
        tx.commit().expect("commit");
    }

    #[test]
    fn test_unknown_query_is_an_error() {
        let db = MemoryExecutor::new();
        assert!(db.query_all("SELECT 1", &[]).is_err());
    }
}
