//! This project's migrations
//!
//! Every migration must be registered in [`registry`]; nothing is discovered
//! from the file system at run time.

mod m1_0_0_create_users_table;
mod m1_1_0_create_posts_table;

use harbormaster::migration::{MigrationError, MigrationRegistry};

pub use m1_0_0_create_users_table::create_users_table;
pub use m1_1_0_create_posts_table::CreatePostsTable;

/// Build the registry of all known migrations
///
/// # Errors
///
/// Returns `MigrationError` if a descriptor is invalid or two migrations share
/// an id or a version.
pub fn registry() -> Result<MigrationRegistry, MigrationError> {
    let mut registry = MigrationRegistry::new();
    registry.register(Box::new(create_users_table()?))?;
    registry.register(Box::new(CreatePostsTable::new()?))?;
    Ok(registry)
}
