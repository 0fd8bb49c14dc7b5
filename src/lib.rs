//! # Harbormaster
//!
//! Versioned, reversible PostgreSQL schema migrations on `may_postgres`.
//!
//! Migrations are registered explicitly in a [`migration::MigrationRegistry`],
//! ordered by dotted numeric version, and applied by a [`migration::Migrator`]
//! that records each one in the `harbormaster_migrations` ledger together with
//! a checksum of its identity. A migration's schema change and its ledger row
//! commit in the same transaction.

pub mod config;
pub mod connection;
pub mod executor;
pub mod migration;
pub mod test_helpers;
pub mod transaction;

pub use config::DatabaseConfig;
pub use connection::{connect, ConnectionError};
pub use executor::{HarborError, HarborExecutor, MayPostgresExecutor, Row, Value};
pub use transaction::{PgTransaction, Transaction, TransactionError};
