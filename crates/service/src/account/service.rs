use std::sync::Arc;

use tracing::{debug, info, instrument};

use super::domain::{NewUser, User};
use super::password;
use super::repository::UserRepository;
use crate::errors::ServiceError;

/// User accounts keyed by email, independent of web framework and storage.
///
/// Every lookup uses one not-found contract: a missing row is
/// [`ServiceError::NotFound`], anything else is a storage failure.
pub struct AccountDirectory {
    repo: Arc<dyn UserRepository>,
}

impl AccountDirectory {
    pub fn new(repo: Arc<dyn UserRepository>) -> Self { Self { repo } }

    pub async fn get_by_email(&self, email: &str) -> Result<User, ServiceError> {
        self.repo.find_by_email(email).await?.ok_or_else(|| ServiceError::not_found("user"))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<User, ServiceError> {
        self.repo.find_by_id(id).await?.ok_or_else(|| ServiceError::not_found("user"))
    }

    /// Create a user; `Conflict` if the email is already registered.
    ///
    /// # Examples
    /// ```
    /// use service::account::{AccountDirectory, domain::NewUser, repository::mock::MockUserRepository};
    /// use std::sync::Arc;
    /// let accounts = AccountDirectory::new(Arc::new(MockUserRepository::default()));
    /// let input = NewUser { name: "octocat".into(), email: "octo@example.com".into(), password_hash: "h".into() };
    /// let user = tokio_test::block_on(accounts.create(input)).unwrap();
    /// assert_eq!(user.email, "octo@example.com");
    /// assert!(user.organisation_id.is_none());
    /// ```
    #[instrument(skip(self, user), fields(email = %user.email))]
    pub async fn create(&self, user: NewUser) -> Result<User, ServiceError> {
        if !user.email.contains('@') {
            return Err(ServiceError::Validation("invalid email".into()));
        }
        if user.password_hash.is_empty() {
            return Err(ServiceError::Validation("password hash required".into()));
        }
        if let Some(existing) = self.repo.find_by_email(&user.email).await? {
            debug!("user exists: {}", existing.email);
            return Err(ServiceError::Conflict(format!("email {} already registered", existing.email)));
        }
        let created = self.repo.create(user).await?;
        info!(user_id = created.id, email = %created.email, "user_created");
        Ok(created)
    }

    /// Create an account for a federated identity that has no password of its
    /// own: a random one is generated and only its hash is kept.
    #[instrument(skip(self))]
    pub async fn create_federated(&self, name: &str, email: &str) -> Result<User, ServiceError> {
        let hash = password::hash_password(&password::generate_password())?;
        self.create(NewUser { name: name.to_string(), email: email.to_string(), password_hash: hash }).await
    }

    /// Full overwrite of the record holding `email`: name, password hash and
    /// organisation all come from `user`.
    #[instrument(skip(self, user), fields(user_id = user.id))]
    pub async fn update_by_email(&self, email: &str, user: &User) -> Result<(), ServiceError> {
        if self.repo.update_by_email(email, user).await? {
            Ok(())
        } else {
            Err(ServiceError::not_found("user"))
        }
    }

    /// Organisation the user currently belongs to, if any.
    pub async fn organisation_id_of(&self, user_id: i64) -> Result<Option<i64>, ServiceError> {
        Ok(self.get_by_id(user_id).await?.organisation_id)
    }

    pub fn generate_password() -> String { password::generate_password() }

    pub fn hash_password(plain: &str) -> Result<String, ServiceError> { password::hash_password(plain) }

    pub fn verify_password(plain: &str, hash: &str) -> bool { password::verify_password(plain, hash) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::repository::mock::MockUserRepository;

    fn directory() -> AccountDirectory {
        AccountDirectory::new(Arc::new(MockUserRepository::default()))
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let accounts = directory();
        assert!(accounts.get_by_email("ghost@example.com").await.unwrap_err().is_not_found());
        assert!(accounts.get_by_id(7).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let accounts = directory();
        accounts.create_federated("a", "a@example.com").await.unwrap();
        let err = accounts.create_federated("b", "a@example.com").await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn emails_are_case_sensitive_as_stored() {
        let accounts = directory();
        accounts.create_federated("a", "Case@Example.com").await.unwrap();
        assert!(accounts.get_by_email("case@example.com").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn federated_account_has_verifiable_hash() {
        let accounts = directory();
        let user = accounts.create_federated("octocat", "octo@example.com").await.unwrap();
        assert!(user.password_hash.starts_with("$argon2"));
        assert!(!AccountDirectory::verify_password("", &user.password_hash));
    }

    #[tokio::test]
    async fn update_overwrites_every_field() {
        let accounts = directory();
        let user = accounts.create_federated("old", "o@example.com").await.unwrap();
        let changed = user.clone().with_name("new").with_organisation(3);
        accounts.update_by_email("o@example.com", &changed).await.unwrap();

        let stored = accounts.get_by_id(user.id).await.unwrap();
        assert_eq!(stored.name, "new");
        assert_eq!(stored.organisation_id, Some(3));
        assert_eq!(accounts.organisation_id_of(user.id).await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn update_of_unknown_email_is_not_found() {
        let accounts = directory();
        let user = accounts.create_federated("x", "x@example.com").await.unwrap();
        assert!(accounts.update_by_email("y@example.com", &user).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn invalid_email_is_rejected() {
        let err = directory().create_federated("x", "no-at-sign").await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }
}
