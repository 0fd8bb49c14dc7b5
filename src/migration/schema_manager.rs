//! SchemaManager - Provides methods for schema operations in migrations

use crate::{HarborError, HarborExecutor, Value};
use sea_query::{
    ColumnDef, IndexCreateStatement, IndexDropStatement, PostgresQueryBuilder, Table,
    TableAlterStatement, TableCreateStatement, TableDropStatement,
};
use std::fmt::Display;

pub(crate) const HAS_TABLE_SQL: &str = r#"
        SELECT EXISTS (
            SELECT 1 FROM information_schema.tables
            WHERE table_schema = current_schema() AND table_name = $1
        ) AS present
    "#;

/// SchemaManager provides methods for performing schema operations in migrations
///
/// It borrows the executor a migration step runs on. During `apply` and
/// `rollback` that executor is the unit's transaction, so everything issued
/// here commits or rolls back together with the ledger write.
pub struct SchemaManager<'a> {
    executor: &'a dyn HarborExecutor,
}

impl<'a> SchemaManager<'a> {
    pub fn new(executor: &'a dyn HarborExecutor) -> Self {
        Self { executor }
    }

    /// Create a table
    ///
    /// # Example
    /// ```rust,no_run
    /// # use harbormaster::migration::SchemaManager;
    /// # fn run(manager: &SchemaManager<'_>) -> Result<(), harbormaster::HarborError> {
    /// use sea_query::{ColumnDef, Table};
    ///
    /// let table = Table::create()
    ///     .table("users")
    ///     .if_not_exists()
    ///     .col(ColumnDef::new("id").integer().not_null().auto_increment().primary_key())
    ///     .col(ColumnDef::new("email").string().not_null().unique_key())
    ///     .to_owned();
    ///
    /// manager.create_table(table)?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `HarborError` if the statement fails.
    pub fn create_table(&self, table: TableCreateStatement) -> Result<(), HarborError> {
        let sql = table.build(PostgresQueryBuilder);
        self.execute(&sql, &[])
    }

    /// Drop a table
    ///
    /// # Errors
    ///
    /// Returns `HarborError` if the statement fails.
    pub fn drop_table(&self, table: TableDropStatement) -> Result<(), HarborError> {
        let sql = table.build(PostgresQueryBuilder);
        self.execute(&sql, &[])
    }

    /// Alter a table
    ///
    /// # Errors
    ///
    /// Returns `HarborError` if the statement fails.
    pub fn alter_table(&self, alter: TableAlterStatement) -> Result<(), HarborError> {
        let sql = alter.build(PostgresQueryBuilder);
        self.execute(&sql, &[])
    }

    /// Create an index
    ///
    /// # Errors
    ///
    /// Returns `HarborError` if the statement fails.
    pub fn create_index(&self, index: IndexCreateStatement) -> Result<(), HarborError> {
        let sql = index.build(PostgresQueryBuilder);
        self.execute(&sql, &[])
    }

    /// Drop an index
    ///
    /// # Errors
    ///
    /// Returns `HarborError` if the statement fails.
    pub fn drop_index(&self, index: IndexDropStatement) -> Result<(), HarborError> {
        let sql = index.build(PostgresQueryBuilder);
        self.execute(&sql, &[])
    }

    /// Add a column to an existing table
    ///
    /// # Errors
    ///
    /// Returns `HarborError` if the statement fails.
    pub fn add_column<T: Display>(&self, table: T, column: ColumnDef) -> Result<(), HarborError> {
        let alter = Table::alter()
            .table(table.to_string())
            .add_column(column)
            .to_owned();
        self.alter_table(alter)
    }

    /// Drop a column from an existing table
    ///
    /// # Errors
    ///
    /// Returns `HarborError` if the statement fails.
    pub fn drop_column<T: Display>(&self, table: T, column: &str) -> Result<(), HarborError> {
        let alter = Table::alter()
            .table(table.to_string())
            .drop_column(column.to_string())
            .to_owned();
        self.alter_table(alter)
    }

    /// Execute raw SQL
    ///
    /// # Errors
    ///
    /// Returns `HarborError` if the statement fails.
    pub fn execute(&self, sql: &str, params: &[Value]) -> Result<(), HarborError> {
        self.executor.execute(sql, params).map(|_| ())
    }

    /// Whether `table` exists in the current schema
    ///
    /// # Errors
    ///
    /// Returns `HarborError` if the catalog query fails.
    pub fn has_table(&self, table: &str) -> Result<bool, HarborError> {
        let row = self.executor.query_one(HAS_TABLE_SQL, &[Value::from(table)])?;
        Ok(row.get("present").and_then(Value::as_bool).unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::MemoryExecutor;
    use sea_query::Index;

    #[test]
    fn test_create_and_drop_table_render_postgres_ddl() {
        let db = MemoryExecutor::new();
        let manager = SchemaManager::new(&db);

        let table = Table::create()
            .table("widgets")
            .col(ColumnDef::new("id").integer().not_null().primary_key())
            .to_owned();
        manager.create_table(table).expect("create table");
        assert!(manager.has_table("widgets").expect("catalog query"));

        manager
            .drop_table(Table::drop().table("widgets").to_owned())
            .expect("drop table");
        assert!(!manager.has_table("widgets").expect("catalog query"));

        let log = db.schema_log();
        assert!(log[0].starts_with(r#"CREATE TABLE "widgets""#));
        assert_eq!(log[1], r#"DROP TABLE "widgets""#);
    }

    #[test]
    fn test_index_and_column_helpers() {
        let db = MemoryExecutor::new();
        let manager = SchemaManager::new(&db);

        manager
            .create_index(
                Index::create()
                    .name("idx_widgets_name")
                    .table("widgets")
                    .col("name")
                    .to_owned(),
            )
            .expect("create index");
        manager
            .add_column("widgets", ColumnDef::new("color").string().null().to_owned())
            .expect("add column");
        manager.drop_column("widgets", "color").expect("drop column");

        let log = db.schema_log();
        assert_eq!(log.len(), 3);
        assert!(log[0].starts_with(r#"CREATE INDEX "idx_widgets_name""#));
        assert!(log[1].contains(r#"ADD COLUMN "color""#));
        assert!(log[2].contains(r#"DROP COLUMN "color""#));
    }

    #[test]
    fn test_execute_propagates_errors() {
        let db = MemoryExecutor::new();
        db.fail_on("BROKEN");
        let manager = SchemaManager::new(&db);
        assert!(manager.execute("CREATE TABLE broken_thing (BROKEN)", &[]).is_err());
        assert!(db.schema_log().is_empty());
    }
}
