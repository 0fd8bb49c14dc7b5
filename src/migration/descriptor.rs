//! `MigrationDescriptor` - identity and metadata of one migration

use crate::migration::checksum::calculate_checksum;
use crate::migration::{MigrationError, Version};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

static ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\-]*$").expect("literal pattern compiles"));

/// Identity and metadata for one migration
///
/// `id` is the stable key the ledger is indexed by; `version` drives ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: Version,
    /// Ids of migrations that must be applied first
    pub dependencies: Vec<String>,
}

impl MigrationDescriptor {
    /// Create a descriptor with an empty description and no dependencies
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Discovery` for an id that is not a slug, and
    /// `MigrationError::InvalidVersion` for a malformed version.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        version: &str,
    ) -> Result<Self, MigrationError> {
        let id = id.into();
        validate_id(&id)?;

        Ok(Self {
            id,
            name: name.into(),
            description: String::new(),
            version: Version::parse(version)?,
            dependencies: Vec::new(),
        })
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Declare a dependency; repeated ids are kept once
    #[must_use]
    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        if !self.dependencies.contains(&id) {
            self.dependencies.push(id);
        }
        self
    }

    /// Fingerprint of the identity fields, as stored in the ledger
    #[must_use]
    pub fn checksum(&self) -> String {
        calculate_checksum(self)
    }

    /// Structured payload stored in the ledger's `metadata` column
    #[must_use]
    pub fn metadata(&self) -> serde_json::Value {
        json!({
            "description": self.description,
            "dependencies": self.dependencies,
        })
    }
}

pub(crate) fn validate_id(id: &str) -> Result<(), MigrationError> {
    let valid = ID_PATTERN.is_match(id);
    if valid {
        Ok(())
    } else {
        Err(MigrationError::Discovery(format!(
            "Migration id '{id}' must start with a letter or digit and contain only letters, digits, '_', '-' or '.'"
        )))
    }
}
