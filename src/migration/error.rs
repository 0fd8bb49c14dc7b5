//! Migration-specific error types

use crate::HarborError;

/// Migration-specific errors
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// Database execution error outside of a unit's own steps
    #[error("Database error: {0}")]
    Database(#[from] HarborError),

    /// The unit set could not be assembled (bad registration, duplicate, bad dependency graph)
    #[error("Migration discovery failed: {0}")]
    Discovery(String),

    /// Version string is not a dot-separated list of non-negative integers
    #[error("Invalid migration version: '{0}'")]
    InvalidVersion(String),

    /// Forward step failed; its transaction was rolled back
    #[error("Migration '{id}' (version {version}) failed during execution: {error}")]
    ExecutionFailed {
        id: String,
        version: String,
        error: String,
    },

    /// Ledger insert failed after the forward step; the shared transaction was rolled back
    #[error("Migration '{id}' (version {version}) could not be recorded in the ledger: {error}")]
    LedgerWrite {
        id: String,
        version: String,
        error: String,
    },

    /// Backward step or ledger deletion failed; the transaction was rolled back
    #[error("Rollback of migration '{id}' (version {version}) failed: {error}")]
    RollbackFailed {
        id: String,
        version: String,
        error: String,
    },

    /// No registered unit has this exact version string
    #[error("No migration found with version '{0}'")]
    NotFound(String),

    /// The unit exists but the ledger holds no row for it
    #[error("Migration '{id}' (version {version}) is not recorded as applied")]
    NotApplied { id: String, version: String },

    /// Ledger checksum differs from the unit's current fingerprint
    #[error(
        "Migration '{id}' (version {version}) has been modified after being applied.\n\
         Stored checksum: {stored}\n\
         Current checksum: {current}"
    )]
    ChecksumMismatch {
        id: String,
        version: String,
        stored: String,
        current: String,
    },

    /// Another run holds the migration lock
    #[error(
        "Migration lock timeout: {0}\n\
         Another process may be running migrations. If this persists, check for a stuck \
         process or a stale row in harbormaster_migrations_lock"
    )]
    LockTimeout(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_unit() {
        let err = MigrationError::ExecutionFailed {
            id: "create_posts".to_string(),
            version: "1.1.0".to_string(),
            error: "syntax error".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("create_posts"));
        assert!(message.contains("1.1.0"));
        assert!(message.contains("syntax error"));
    }

    #[test]
    fn test_checksum_mismatch_display() {
        let err = MigrationError::ChecksumMismatch {
            id: "create_users".to_string(),
            version: "1.0.0".to_string(),
            stored: "aaa".to_string(),
            current: "bbb".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("modified after being applied"));
        assert!(message.contains("Stored checksum: aaa"));
        assert!(message.contains("Current checksum: bbb"));
    }

    #[test]
    fn test_from_harbor_error() {
        let err: MigrationError = HarborError::QueryError("boom".to_string()).into();
        assert!(matches!(err, MigrationError::Database(_)));
        assert!(err.to_string().contains("boom"));
    }
}
