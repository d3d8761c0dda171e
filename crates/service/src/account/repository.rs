use async_trait::async_trait;

use super::domain::{NewUser, User};
use crate::errors::ServiceError;

/// Repository abstraction for user persistence.
///
/// Lookups return `Ok(None)` for a missing row; only storage failures are errors.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ServiceError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, ServiceError>;
    /// Insert and assign an id; `Conflict` when the email is taken.
    async fn create(&self, user: NewUser) -> Result<User, ServiceError>;
    /// Overwrite the row holding `email`; `false` when there is none.
    async fn update_by_email(&self, email: &str, user: &User) -> Result<bool, ServiceError>;
}

/// Simple in-memory mock repository for tests and doc examples
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MockUserRepository {
        users: Mutex<HashMap<String, User>>, // key: email
        next_id: Mutex<i64>,
    }

    impl MockUserRepository {
        pub fn count(&self) -> usize {
            self.users.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl UserRepository for MockUserRepository {
        async fn find_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
            Ok(self.users.lock().unwrap().get(email).cloned())
        }

        async fn find_by_id(&self, id: i64) -> Result<Option<User>, ServiceError> {
            Ok(self.users.lock().unwrap().values().find(|u| u.id == id).cloned())
        }

        async fn create(&self, user: NewUser) -> Result<User, ServiceError> {
            let mut users = self.users.lock().unwrap();
            if users.contains_key(&user.email) {
                return Err(ServiceError::Conflict(format!("email {} already registered", user.email)));
            }
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            let created = User { id: *next, name: user.name, email: user.email, password_hash: user.password_hash, organisation_id: None };
            users.insert(created.email.clone(), created.clone());
            Ok(created)
        }

        async fn update_by_email(&self, email: &str, user: &User) -> Result<bool, ServiceError> {
            let mut users = self.users.lock().unwrap();
            match users.get_mut(email) {
                Some(stored) => {
                    stored.name = user.name.clone();
                    stored.password_hash = user.password_hash.clone();
                    stored.organisation_id = user.organisation_id;
                    Ok(true)
                }
                None => Ok(false),
            }
        }
    }
}
