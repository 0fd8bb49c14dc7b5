//! Dotted numeric migration versions
//!
//! Versions compare segment by segment as integers, with absent trailing
//! segments treated as zero: `"1.0" == "1.0.0"`, `"0.9" < "0.10"`.

use crate::migration::MigrationError;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A parsed migration version that remembers its original spelling
///
/// Equality and ordering are numeric; use [`Version::as_str`] when the exact
/// spelling matters (rollback targets are matched on it).
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    segments: Vec<u64>,
}

impl Version {
    /// Parse a version such as `"1.0.1"` or `"002"`
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::InvalidVersion` for empty input, empty segments,
    /// or segments that are not non-negative integers.
    pub fn parse(raw: &str) -> Result<Self, MigrationError> {
        if raw.is_empty() {
            return Err(MigrationError::InvalidVersion(raw.to_string()));
        }

        let segments = raw
            .split('.')
            .map(|segment| {
                if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(MigrationError::InvalidVersion(raw.to_string()));
                }
                segment
                    .parse::<u64>()
                    .map_err(|_| MigrationError::InvalidVersion(raw.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The version exactly as it was written
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn segments(&self) -> &[u64] {
        &self.segments
    }
}

fn compare_segments(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    for idx in 0..len {
        let left = a.get(idx).copied().unwrap_or(0);
        let right = b.get(idx).copied().unwrap_or(0);
        match left.cmp(&right) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Compare two raw version strings
///
/// Segments that do not parse as integers count as zero, so this never fails;
/// it is meant for strings read back from the ledger.
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let parse = |s: &str| -> Vec<u64> {
        s.split('.')
            .map(|segment| segment.parse::<u64>().unwrap_or(0))
            .collect()
    };
    compare_segments(&parse(a), &parse(b))
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_segments(&self.segments, &other.segments)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Version {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(raw: &str) -> Version {
        Version::parse(raw).expect("valid version")
    }

    #[test]
    fn test_missing_segments_are_zero() {
        assert_eq!(v("1.0"), v("1.0.0"));
        assert_eq!(v("1"), v("1.0.0.0"));
        assert!(v("1.0") < v("1.0.1"));
    }

    #[test]
    fn test_numeric_not_lexicographic() {
        assert!(v("2.0") > v("1.9.9"));
        assert!(v("0.9") < v("0.10"));
        assert!(v("001") < v("002"));
        assert_eq!(v("001"), v("1"));
    }

    #[test]
    fn test_raw_spelling_is_preserved() {
        let version = v("001.02");
        assert_eq!(version.as_str(), "001.02");
        assert_eq!(version.to_string(), "001.02");
        assert_eq!(version.segments(), &[1, 2]);
    }

    #[test]
    fn test_invalid_versions_rejected() {
        for raw in ["", "1..0", ".1", "1.", "v1", "1.0-beta", "1.-2", " 1"] {
            assert!(
                matches!(Version::parse(raw), Err(MigrationError::InvalidVersion(_))),
                "should reject {raw:?}"
            );
        }
    }

    #[test]
    fn test_compare_versions_on_raw_strings() {
        assert_eq!(compare_versions("1.0", "1.0.0"), Ordering::Equal);
        assert_eq!(compare_versions("2.0", "1.9.9"), Ordering::Greater);
        assert_eq!(compare_versions("0.9", "0.10"), Ordering::Less);
    }

    #[test]
    fn test_sorting_is_independent_of_input_order() {
        let mut versions = vec![v("1.0.1"), v("1.0.0"), v("2.0.0")];
        versions.sort();
        let raw: Vec<&str> = versions.iter().map(Version::as_str).collect();
        assert_eq!(raw, ["1.0.0", "1.0.1", "2.0.0"]);
    }
}
