use async_trait::async_trait;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};

use crate::account::domain::{NewUser, User};
use crate::account::repository::UserRepository;
use crate::errors::ServiceError;
use crate::membership::domain::Membership;
use crate::membership::repository::MembershipRepository;
use crate::organisation::domain::Organisation;
use crate::organisation::repository::{OrganisationRepository, OrganisationTxn};

fn db_err(e: sea_orm::DbErr) -> ServiceError {
    ServiceError::Repository(e.to_string())
}

pub struct SeaOrmUserRepository {
    pub db: DatabaseConnection,
}

#[async_trait]
impl UserRepository for SeaOrmUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        Ok(models::user::find_by_email(&self.db, email).await?.map(User::from))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, ServiceError> {
        Ok(models::user::find_by_id(&self.db, id).await?.map(User::from))
    }

    async fn create(&self, user: NewUser) -> Result<User, ServiceError> {
        let created = models::user::create(&self.db, &user.name, &user.email, &user.password_hash).await?;
        Ok(created.into())
    }

    async fn update_by_email(&self, email: &str, user: &User) -> Result<bool, ServiceError> {
        let updated = models::user::overwrite_by_email(&self.db, email, &user.name, &user.password_hash, user.organisation_id).await?;
        Ok(updated.is_some())
    }
}

pub struct SeaOrmOrganisationRepository {
    pub db: DatabaseConnection,
}

/// Organisation writes staged in a database transaction.
pub struct SeaOrmOrganisationTxn {
    txn: DatabaseTransaction,
}

#[async_trait]
impl OrganisationRepository for SeaOrmOrganisationRepository {
    async fn begin(&self) -> Result<Box<dyn OrganisationTxn>, ServiceError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        Ok(Box::new(SeaOrmOrganisationTxn { txn }))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Organisation>, ServiceError> {
        Ok(models::organisation::find_by_id(&self.db, id).await?.map(Organisation::from))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Organisation>, ServiceError> {
        Ok(models::organisation::find_by_name(&self.db, name).await?.map(Organisation::from))
    }
}

#[async_trait]
impl OrganisationTxn for SeaOrmOrganisationTxn {
    async fn insert(&mut self, name: &str) -> Result<Organisation, ServiceError> {
        Ok(models::organisation::create(&self.txn, name).await?.into())
    }

    async fn commit(self: Box<Self>) -> Result<(), ServiceError> {
        self.txn.commit().await.map_err(db_err)
    }

    async fn rollback(self: Box<Self>) -> Result<(), ServiceError> {
        self.txn.rollback().await.map_err(db_err)
    }
}

pub struct SeaOrmMembershipRepository {
    pub db: DatabaseConnection,
}

#[async_trait]
impl MembershipRepository for SeaOrmMembershipRepository {
    async fn find(&self, user_id: i64, organisation_id: i64) -> Result<Option<Membership>, ServiceError> {
        Ok(models::organisation_user::find_pair(&self.db, user_id, organisation_id).await?.map(Membership::from))
    }

    async fn create(&self, user_id: i64, organisation_id: i64) -> Result<Membership, ServiceError> {
        Ok(models::organisation_user::create(&self.db, user_id, organisation_id).await?.into())
    }
}
