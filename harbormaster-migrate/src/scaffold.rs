//! `generate` - write a new migration skeleton

use chrono::Utc;
use harbormaster::migration::{MigrationError, Version};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("literal pattern compiles"));

/// File name for a migration: `m{version with '.' as '_'}_{name}.rs`
#[must_use]
pub fn migration_file_name(name: &str, version: &Version) -> String {
    format!("m{}_{name}.rs", version.as_str().replace('.', "_"))
}

/// `create_users_table` -> `CreateUsersTable`
#[must_use]
pub fn struct_name(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// `create_users_table` -> `Create users table`
fn title(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

fn render(name: &str, version: &Version) -> String {
    format!(
        r#"//! Migration: {title}
//! Version: {version}
//! Generated: {generated}

use harbormaster::migration::{{Migration, MigrationDescriptor, MigrationError, SchemaManager}};
use harbormaster::HarborError;

pub struct {struct_name} {{
    descriptor: MigrationDescriptor,
}}

impl {struct_name} {{
    pub fn new() -> Result<Self, MigrationError> {{
        let descriptor = MigrationDescriptor::new("{name}", "{title}", "{version}")?;
        Ok(Self {{ descriptor }})
    }}
}}

impl Migration for {struct_name} {{
    fn descriptor(&self) -> &MigrationDescriptor {{
        &self.descriptor
    }}

    fn up(&self, manager: &SchemaManager<'_>) -> Result<(), HarborError> {{
        let _ = manager;
        Ok(())
    }}

    fn down(&self, manager: &SchemaManager<'_>) -> Result<(), HarborError> {{
        let _ = manager;
        Ok(())
    }}
}}
"#,
        title = title(name),
        version = version,
        generated = Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
        struct_name = struct_name(name),
        name = name,
    )
}

/// Write a skeleton for migration `name` at `version` into `dir`
///
/// Returns the path of the new file. The migration still has to be added to
/// the registry by hand.
///
/// # Errors
///
/// - `MigrationError::Discovery` for a name that is not lower snake case, if
///   the file already exists, or if `dir` cannot be created or written
/// - `MigrationError::InvalidVersion` for a malformed version
pub fn generate(dir: &Path, name: &str, version: &str) -> Result<PathBuf, MigrationError> {
    let valid_name = NAME_PATTERN.is_match(name);
    if !valid_name {
        return Err(MigrationError::Discovery(format!(
            "Migration name '{name}' must be lower snake case (e.g. create_users_table)"
        )));
    }
    let version = Version::parse(version)?;

    fs::create_dir_all(dir).map_err(|e| {
        MigrationError::Discovery(format!(
            "Failed to create migrations directory {}: {e}",
            dir.display()
        ))
    })?;

    let path = dir.join(migration_file_name(name, &version));
    if path.exists() {
        return Err(MigrationError::Discovery(format!(
            "Migration file {} already exists",
            path.display()
        )));
    }

    fs::write(&path, render(name, &version)).map_err(|e| {
        MigrationError::Discovery(format!("Failed to write {}: {e}", path.display()))
    })?;
    log::info!("Generated migration {}", path.display());

    Ok(path)
}
