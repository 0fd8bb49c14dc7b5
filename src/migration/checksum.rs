//! Checksum calculation for migration descriptors

use crate::migration::{MigrationDescriptor, MigrationError};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Field order here is the order hashed
#[derive(Serialize)]
struct Canonical<'a> {
    id: &'a str,
    name: &'a str,
    version: &'a str,
    description: &'a str,
}

/// Calculate the SHA-256 fingerprint of a migration's identity
///
/// Covers `id`, `name`, `version` (as written) and `description`. Dependencies
/// are not part of the fingerprint.
///
/// # Arguments
///
/// * `descriptor` - The migration whose identity is fingerprinted
///
/// # Returns
///
/// Returns the lowercase hexadecimal SHA-256 hash (64 characters)
#[must_use]
pub fn calculate_checksum(descriptor: &MigrationDescriptor) -> String {
    fingerprint(
        &descriptor.id,
        &descriptor.name,
        descriptor.version.as_str(),
        &descriptor.description,
    )
}

/// Fingerprint four identity fields
///
/// The fields are serialized as a compact JSON object with keys in the order
/// `id`, `name`, `version`, `description`, then hashed.
#[must_use]
pub fn fingerprint(id: &str, name: &str, version: &str, description: &str) -> String {
    // A struct of string fields always serializes.
    let canonical = serde_json::to_string(&Canonical {
        id,
        name,
        version,
        description,
    })
    .unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Validate a stored checksum against the descriptor's current fingerprint
///
/// # Arguments
///
/// * `descriptor` - The migration as currently registered
/// * `stored_checksum` - The checksum stored in the ledger
///
/// # Errors
///
/// Returns `MigrationError::ChecksumMismatch` when they differ.
pub fn validate_checksum(
    descriptor: &MigrationDescriptor,
    stored_checksum: &str,
) -> Result<(), MigrationError> {
    let current = calculate_checksum(descriptor);
    if stored_checksum == current {
        Ok(())
    } else {
        Err(MigrationError::ChecksumMismatch {
            id: descriptor.id.clone(),
            version: descriptor.version.to_string(),
            stored: stored_checksum.to_string(),
            current,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(description: &str) -> MigrationDescriptor {
        MigrationDescriptor::new("create_users", "Create users", "1.0.0")
            .expect("valid descriptor")
            .with_description(description)
    }

    #[test]
    fn test_checksum_is_deterministic() {
        let a = descriptor("Users table");
        let b = descriptor("Users table");
        assert_eq!(calculate_checksum(&a), calculate_checksum(&b));
        assert_eq!(calculate_checksum(&a).len(), 64);
    }

    #[test]
    fn test_checksum_hashes_fields_in_declared_order() {
        // sha256 of {"id":"create_users","name":"Create users","version":"1.0.0","description":"Users table"}
        assert_eq!(
            calculate_checksum(&descriptor("Users table")),
            "850e7bc7b6b30e6ed9ca0c80f1d2b949fc0ccdbd9a5e0a0b6c4e725559162a5f"
        );
    }

    #[test]
    fn test_description_change_changes_checksum() {
        let a = calculate_checksum(&descriptor("Users table"));
        let b = calculate_checksum(&descriptor("Users table "));
        assert_ne!(a, b);
    }

    #[test]
    fn test_fields_are_not_interchangeable() {
        assert_ne!(fingerprint("a", "b", "1", ""), fingerprint("b", "a", "1", ""));
        assert_ne!(fingerprint("a", "b", "1.0", ""), fingerprint("a", "b", "1.0.0", ""));
    }

    #[test]
    fn test_dependencies_do_not_affect_checksum() {
        let plain = descriptor("Users table");
        let with_dep = descriptor("Users table").depends_on("bootstrap");
        assert_eq!(calculate_checksum(&plain), calculate_checksum(&with_dep));
    }

    #[test]
    fn test_validate_checksum() {
        let d = descriptor("Users table");
        assert!(validate_checksum(&d, &calculate_checksum(&d)).is_ok());
        assert!(matches!(
            validate_checksum(&d, "deadbeef"),
            Err(MigrationError::ChecksumMismatch { .. })
        ));
    }
}
