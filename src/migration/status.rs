//! Migration status tracking

use crate::migration::version::compare_versions;
use crate::migration::LedgerEntry;

/// Migration status information
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    /// Applied migrations (from the ledger, most recent first)
    pub applied: Vec<LedgerEntry>,

    /// Registered migrations with no ledger row, in apply order
    pub pending: Vec<PendingMigration>,

    /// Ledger rows whose migration is no longer registered
    pub orphaned: Vec<LedgerEntry>,

    /// Ledger rows whose checksum no longer matches the registered migration
    pub drifted: Vec<ChecksumDrift>,

    /// Number of registered migrations
    pub total: usize,

    pub applied_count: usize,

    pub pending_count: usize,
}

/// A registered migration that has not been applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMigration {
    pub id: String,
    pub name: String,
    pub version: String,
    pub checksum: String,
}

/// An applied migration whose definition changed afterwards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumDrift {
    pub id: String,
    pub version: String,
    /// Checksum stored at apply time
    pub stored: String,
    /// Checksum of the migration as registered now
    pub current: String,
}

impl MigrationStatus {
    /// Create a new `MigrationStatus`
    #[must_use]
    pub fn new(
        applied: Vec<LedgerEntry>,
        pending: Vec<PendingMigration>,
        orphaned: Vec<LedgerEntry>,
        drifted: Vec<ChecksumDrift>,
    ) -> Self {
        let applied_count = applied.len();
        let pending_count = pending.len();
        let total = applied_count - orphaned.len().min(applied_count) + pending_count;

        Self {
            applied,
            pending,
            orphaned,
            drifted,
            total,
            applied_count,
            pending_count,
        }
    }

    /// Check if all migrations are applied
    #[must_use]
    pub fn is_up_to_date(&self) -> bool {
        self.pending_count == 0
    }

    /// Whether the ledger agrees with the registered migrations
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.orphaned.is_empty() && self.drifted.is_empty()
    }

    /// Get the highest applied migration version
    #[must_use]
    pub fn latest_applied_version(&self) -> Option<&str> {
        self.applied
            .iter()
            .map(|entry| entry.version.as_str())
            .max_by(|a, b| compare_versions(a, b))
    }

    /// Get the next pending migration version
    #[must_use]
    pub fn next_pending_version(&self) -> Option<&str> {
        self.pending.first().map(|m| m.version.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(id: &str, version: &str) -> LedgerEntry {
        LedgerEntry {
            id: id.to_string(),
            name: id.to_string(),
            version: version.to_string(),
            applied_at: Utc::now(),
            checksum: "abc".to_string(),
            metadata: serde_json::Value::Null,
            execution_time_ms: None,
        }
    }

    fn pending(id: &str, version: &str) -> PendingMigration {
        PendingMigration {
            id: id.to_string(),
            name: id.to_string(),
            version: version.to_string(),
            checksum: "def".to_string(),
        }
    }

    #[test]
    fn test_counts_and_versions() {
        let status = MigrationStatus::new(
            vec![entry("b", "0.10"), entry("a", "0.9")],
            vec![pending("c", "1.0"), pending("d", "1.1")],
            Vec::new(),
            Vec::new(),
        );

        assert_eq!(status.total, 4);
        assert_eq!(status.applied_count, 2);
        assert_eq!(status.pending_count, 2);
        assert!(!status.is_up_to_date());
        assert!(status.is_consistent());
        assert_eq!(status.latest_applied_version(), Some("0.10"));
        assert_eq!(status.next_pending_version(), Some("1.0"));
    }

    #[test]
    fn test_orphans_are_not_counted_as_registered() {
        let status = MigrationStatus::new(
            vec![entry("a", "1.0"), entry("gone", "0.5")],
            Vec::new(),
            vec![entry("gone", "0.5")],
            Vec::new(),
        );
        assert_eq!(status.total, 1);
        assert!(status.is_up_to_date());
        assert!(!status.is_consistent());
    }

    #[test]
    fn test_empty_status() {
        let status = MigrationStatus::new(Vec::new(), Vec::new(), Vec::new(), Vec::new());
        assert!(status.is_up_to_date());
        assert_eq!(status.latest_applied_version(), None);
        assert_eq!(status.next_pending_version(), None);
    }
}
