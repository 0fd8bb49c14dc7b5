//! Migration: Create posts table
//! Version: 1.1.0

use harbormaster::migration::{Migration, MigrationDescriptor, MigrationError, SchemaManager};
use harbormaster::HarborError;
use sea_query::{ColumnDef, Expr, ForeignKey, ForeignKeyAction, Index, Table};

pub struct CreatePostsTable {
    descriptor: MigrationDescriptor,
}

impl CreatePostsTable {
    pub fn new() -> Result<Self, MigrationError> {
        let descriptor = MigrationDescriptor::new("create_posts_table", "Create posts table", "1.1.0")?
            .with_description("Posts authored by users")
            .depends_on("create_users_table");
        Ok(Self { descriptor })
    }
}

impl Migration for CreatePostsTable {
    fn descriptor(&self) -> &MigrationDescriptor {
        &self.descriptor
    }

    fn up(&self, manager: &SchemaManager<'_>) -> Result<(), HarborError> {
        let table = Table::create()
            .table("posts")
            .if_not_exists()
            .col(ColumnDef::new("id").integer().not_null().auto_increment().primary_key())
            .col(ColumnDef::new("author_id").integer().not_null())
            .col(ColumnDef::new("title").string().not_null())
            .col(ColumnDef::new("body").text())
            .col(
                ColumnDef::new("created_at")
                    .timestamp_with_time_zone()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .foreign_key(
                ForeignKey::create()
                    .name("fk_posts_author_id")
                    .from("posts", "author_id")
                    .to("users", "id")
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .to_owned();
        manager.create_table(table)?;

        manager.create_index(
            Index::create()
                .name("idx_posts_author_id")
                .table("posts")
                .col("author_id")
                .to_owned(),
        )
    }

    fn down(&self, manager: &SchemaManager<'_>) -> Result<(), HarborError> {
        manager.drop_index(Index::drop().name("idx_posts_author_id").to_owned())?;
        manager.drop_table(Table::drop().table("posts").to_owned())
    }
}
