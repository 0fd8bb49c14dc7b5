//! `LedgerEntry` - Represents rows of the `harbormaster_migrations` ledger table

use crate::{HarborError, Row};
use chrono::{DateTime, NaiveDateTime, Utc};

/// One applied migration, as persisted in the ledger
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    /// Descriptor id (primary key)
    pub id: String,

    /// Human-readable migration name
    pub name: String,

    /// Version string exactly as the unit declared it
    pub version: String,

    /// When the row was inserted
    pub applied_at: DateTime<Utc>,

    /// Fingerprint of the descriptor at apply time
    pub checksum: String,

    /// Description and dependency list at apply time
    pub metadata: serde_json::Value,

    /// Forward step duration (`None` for rows written by older tooling)
    pub execution_time_ms: Option<i64>,
}

impl LedgerEntry {
    /// Create a `LedgerEntry` from a ledger row
    ///
    /// Expects the columns selected by the ledger queries: `id`, `name`, `version`,
    /// `applied_at` and `metadata` cast to text, `checksum`, `execution_time_ms`.
    ///
    /// # Errors
    ///
    /// Returns `HarborError::ParseError` if a column is missing, the timestamp is in
    /// an unrecognized format, or the metadata is not valid JSON.
    pub fn from_row(row: &Row) -> Result<Self, HarborError> {
        let applied_at = parse_timestamp(row.get_str("applied_at")?)?;

        let metadata = match row.get_opt_str("metadata")? {
            Some(raw) => serde_json::from_str(raw).map_err(|e| {
                HarborError::ParseError(format!("Failed to parse ledger metadata '{raw}': {e}"))
            })?,
            None => serde_json::Value::Null,
        };

        Ok(Self {
            id: row.get_str("id")?.to_string(),
            name: row.get_str("name")?.to_string(),
            version: row.get_str("version")?.to_string(),
            applied_at,
            checksum: row.get_str("checksum")?.to_string(),
            metadata,
            execution_time_ms: row.get_opt_i64("execution_time_ms")?,
        })
    }

    /// Description recorded at apply time
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.metadata.get("description").and_then(serde_json::Value::as_str)
    }

    /// Dependency ids recorded at apply time
    #[must_use]
    pub fn dependencies(&self) -> Vec<String> {
        self.metadata
            .get("dependencies")
            .and_then(serde_json::Value::as_array)
            .map(|deps| {
                deps.iter()
                    .filter_map(serde_json::Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Parse a timestamp as PostgreSQL renders `timestamptz::text` (or RFC 3339)
///
/// # Errors
///
/// Returns `HarborError::ParseError` if no known format matches.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, HarborError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    // `2024-01-20 12:00:00.123456+00`
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }

    Err(HarborError::ParseError(format!(
        "Failed to parse timestamp '{raw}': unrecognized format"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;
    use chrono::{Datelike, Timelike};

    fn ledger_row(applied_at: &str, metadata: Value) -> Row {
        Row::from_pairs([
            ("id", Value::from("create_users")),
            ("name", Value::from("Create users")),
            ("version", Value::from("1.0.0")),
            ("applied_at", Value::from(applied_at)),
            ("checksum", Value::from("abc123")),
            ("metadata", metadata),
            ("execution_time_ms", Value::Int(12)),
        ])
    }

    #[test]
    fn test_from_row() {
        let row = ledger_row(
            "2024-01-20 12:30:45.123456+00",
            Value::from(r#"{"description":"Users table","dependencies":["bootstrap"]}"#),
        );
        let entry = LedgerEntry::from_row(&row).expect("parse ledger row");

        assert_eq!(entry.id, "create_users");
        assert_eq!(entry.version, "1.0.0");
        assert_eq!(entry.applied_at.year(), 2024);
        assert_eq!(entry.applied_at.minute(), 30);
        assert_eq!(entry.execution_time_ms, Some(12));
        assert_eq!(entry.description(), Some("Users table"));
        assert_eq!(entry.dependencies(), vec!["bootstrap".to_string()]);
    }

    #[test]
    fn test_from_row_null_metadata() {
        let entry = LedgerEntry::from_row(&ledger_row("2024-01-20T12:30:45Z", Value::Null))
            .expect("parse ledger row");
        assert_eq!(entry.metadata, serde_json::Value::Null);
        assert!(entry.dependencies().is_empty());
        assert_eq!(entry.description(), None);
    }

    #[test]
    fn test_from_row_bad_metadata() {
        let row = ledger_row("2024-01-20T12:30:45Z", Value::from("{not json"));
        assert!(matches!(LedgerEntry::from_row(&row), Err(HarborError::ParseError(_))));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        for raw in [
            "2024-01-20T12:30:45Z",
            "2024-01-20T12:30:45.5+02:00",
            "2024-01-20 12:30:45+00",
            "2024-01-20 12:30:45.123456+05:30",
            "2024-01-20 12:30:45.123",
            "2024-01-20T12:30:45",
        ] {
            assert!(parse_timestamp(raw).is_ok(), "should parse {raw}");
        }
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_parse_timestamp_normalizes_to_utc() {
        let ts = parse_timestamp("2024-01-20 12:30:45+02").expect("parse");
        assert_eq!(ts.hour(), 10);
    }
}
