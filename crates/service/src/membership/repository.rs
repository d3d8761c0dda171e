use async_trait::async_trait;

use super::domain::Membership;
use crate::errors::ServiceError;

#[async_trait]
pub trait MembershipRepository: Send + Sync {
    async fn find(&self, user_id: i64, organisation_id: i64) -> Result<Option<Membership>, ServiceError>;
    /// Insert an active membership; `Conflict` when the pair already exists.
    async fn create(&self, user_id: i64, organisation_id: i64) -> Result<Membership, ServiceError>;
}

/// Simple in-memory mock repository for tests and doc examples
pub mod mock {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MockMembershipRepository {
        rows: Mutex<HashMap<(i64, i64), Membership>>,
        next_id: Mutex<i64>,
    }

    impl MockMembershipRepository {
        pub fn count(&self) -> usize {
            self.rows.lock().unwrap().len()
        }

        pub fn count_for_user(&self, user_id: i64) -> usize {
            self.rows.lock().unwrap().keys().filter(|(u, _)| *u == user_id).count()
        }
    }

    #[async_trait]
    impl MembershipRepository for MockMembershipRepository {
        async fn find(&self, user_id: i64, organisation_id: i64) -> Result<Option<Membership>, ServiceError> {
            Ok(self.rows.lock().unwrap().get(&(user_id, organisation_id)).cloned())
        }

        async fn create(&self, user_id: i64, organisation_id: i64) -> Result<Membership, ServiceError> {
            let mut rows = self.rows.lock().unwrap();
            if rows.contains_key(&(user_id, organisation_id)) {
                return Err(ServiceError::Conflict(format!("user {user_id} already in organisation {organisation_id}")));
            }
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            let now = Utc::now();
            let row = Membership { id: *next, user_id, organisation_id, is_active: true, created_at: now, updated_at: now };
            rows.insert((user_id, organisation_id), row.clone());
            Ok(row)
        }
    }
}
