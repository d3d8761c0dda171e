//! Create `organisation_user` membership table with FKs to `user` and `organisation`.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OrganisationUser::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OrganisationUser::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(big_integer(OrganisationUser::UserId).not_null())
                    .col(big_integer(OrganisationUser::OrganisationId).not_null())
                    .col(boolean(OrganisationUser::IsActive).not_null().default(true))
                    .col(timestamp_with_time_zone(OrganisationUser::CreatedAt).not_null())
                    .col(timestamp_with_time_zone(OrganisationUser::UpdatedAt).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_organisation_user_user")
                            .from(OrganisationUser::Table, OrganisationUser::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_organisation_user_organisation")
                            .from(OrganisationUser::Table, OrganisationUser::OrganisationId)
                            .to(Organisation::Table, Organisation::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(OrganisationUser::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum OrganisationUser { Table, Id, UserId, OrganisationId, IsActive, CreatedAt, UpdatedAt }

#[derive(DeriveIden)]
enum User { Table, Id }

#[derive(DeriveIden)]
enum Organisation { Table, Id }
