//! Migration system for Harbormaster
//!
//! This module provides the infrastructure for database migrations, including:
//! - The [`Migration`] trait and the stock [`SqlMigration`]
//! - [`SchemaManager`] for schema operations inside a migration
//! - The ledger of applied migrations and its checksums
//! - [`MigrationRegistry`] and the [`Migrator`] that applies and rolls back
//!
//! # Example
//!
//! ```rust,no_run
//! use harbormaster::migration::{Migration, MigrationDescriptor, SchemaManager};
//! use harbormaster::HarborError;
//! use sea_query::{ColumnDef, Table};
//!
//! pub struct CreateUsersTable {
//!     descriptor: MigrationDescriptor,
//! }
//!
//! impl Migration for CreateUsersTable {
//!     fn descriptor(&self) -> &MigrationDescriptor {
//!         &self.descriptor
//!     }
//!
//!     fn up(&self, manager: &SchemaManager<'_>) -> Result<(), HarborError> {
//!         let table = Table::create()
//!             .table("users")
//!             .col(ColumnDef::new("id").integer().not_null().auto_increment().primary_key())
//!             .col(ColumnDef::new("email").string().not_null().unique_key())
//!             .to_owned();
//!         manager.create_table(table)
//!     }
//!
//!     fn down(&self, manager: &SchemaManager<'_>) -> Result<(), HarborError> {
//!         manager.drop_table(Table::drop().table("users").to_owned())
//!     }
//! }
//! ```

pub mod checksum;
pub mod dependency;
pub mod descriptor;
pub mod error;
pub mod lock;
pub mod migration;
pub mod migrator;
pub mod record;
pub mod registry;
pub mod schema_manager;
pub mod state_table;
pub mod status;
pub mod version;

pub use checksum::{calculate_checksum, validate_checksum};
pub use descriptor::MigrationDescriptor;
pub use error::MigrationError;
pub use lock::{MigrationLockGuard, LOCK_TABLE};
pub use migration::{Migration, SqlMigration};
pub use migrator::{ApplyEvent, ApplyReport, Migrator};
pub use record::LedgerEntry;
pub use registry::MigrationRegistry;
pub use schema_manager::SchemaManager;
pub use state_table::{initialize_state_table, LEDGER_TABLE};
pub use status::{ChecksumDrift, MigrationStatus, PendingMigration};
pub use version::{compare_versions, Version};
