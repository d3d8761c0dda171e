use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Users: index on organisation_id
        manager
            .create_index(
                Index::create()
                    .name("idx_user_organisation")
                    .table(User::Table)
                    .col(User::OrganisationId)
                    .to_owned(),
            )
            .await?;

        // Organisation: lookups by generated name
        manager
            .create_index(
                Index::create()
                    .name("idx_organisation_name")
                    .table(Organisation::Table)
                    .col(Organisation::Name)
                    .to_owned(),
            )
            .await?;

        // Membership: at most one row per (user_id, organisation_id)
        manager
            .create_index(
                Index::create()
                    .name("uniq_organisation_user_pair")
                    .table(OrganisationUser::Table)
                    .col(OrganisationUser::UserId)
                    .col(OrganisationUser::OrganisationId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("uniq_organisation_user_pair").table(OrganisationUser::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_organisation_name").table(Organisation::Table).to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_user_organisation").table(User::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum User { Table, OrganisationId }

#[derive(DeriveIden)]
enum Organisation { Table, Name }

#[derive(DeriveIden)]
enum OrganisationUser { Table, UserId, OrganisationId }
