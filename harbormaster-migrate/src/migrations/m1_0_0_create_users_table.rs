//! Migration: Create users table
//! Version: 1.0.0

use harbormaster::migration::{MigrationDescriptor, MigrationError, SqlMigration};

pub fn create_users_table() -> Result<SqlMigration, MigrationError> {
    let descriptor = MigrationDescriptor::new("create_users_table", "Create users table", "1.0.0")?
        .with_description("Users with a unique email address");

    Ok(SqlMigration::new(descriptor)
        .up_sql(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id SERIAL PRIMARY KEY,
                email VARCHAR(255) NOT NULL UNIQUE,
                display_name VARCHAR(255),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .up_sql("CREATE INDEX IF NOT EXISTS idx_users_created_at ON users(created_at)")
        .down_sql("DROP INDEX IF EXISTS idx_users_created_at")
        .down_sql("DROP TABLE IF EXISTS users"))
}
