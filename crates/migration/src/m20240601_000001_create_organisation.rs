//! Create `organisation` table.
//!
//! Names are generated (`Organisation_###`) and deliberately not unique.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Organisation::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Organisation::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(string_len(Organisation::Name, 128).not_null())
                    .col(timestamp_with_time_zone(Organisation::CreatedAt).not_null())
                    .col(timestamp_with_time_zone(Organisation::UpdatedAt).not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Organisation::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Organisation { Table, Id, Name, CreatedAt, UpdatedAt }
