use async_trait::async_trait;

use super::domain::Organisation;
use crate::errors::ServiceError;

/// Repository abstraction for organisations.
///
/// Creation only happens through a transaction handle so the row can be
/// discarded when the side-effect that accompanies it fails.
#[async_trait]
pub trait OrganisationRepository: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn OrganisationTxn>, ServiceError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<Organisation>, ServiceError>;
    async fn find_by_name(&self, name: &str) -> Result<Option<Organisation>, ServiceError>;
}

/// Open transaction; dropping it without `commit` discards its writes.
#[async_trait]
pub trait OrganisationTxn: Send {
    async fn insert(&mut self, name: &str) -> Result<Organisation, ServiceError>;
    async fn commit(self: Box<Self>) -> Result<(), ServiceError>;
    async fn rollback(self: Box<Self>) -> Result<(), ServiceError>;
}

/// Simple in-memory mock repository for tests and doc examples
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    pub struct MockOrganisationRepository {
        committed: Arc<Mutex<Vec<Organisation>>>,
        next_id: Arc<AtomicI64>,
    }

    impl MockOrganisationRepository {
        pub fn count(&self) -> usize {
            self.committed.lock().unwrap().len()
        }
    }

    struct MockTxn {
        committed: Arc<Mutex<Vec<Organisation>>>,
        next_id: Arc<AtomicI64>,
        pending: Vec<Organisation>,
    }

    #[async_trait]
    impl OrganisationRepository for MockOrganisationRepository {
        async fn begin(&self) -> Result<Box<dyn OrganisationTxn>, ServiceError> {
            Ok(Box::new(MockTxn {
                committed: Arc::clone(&self.committed),
                next_id: Arc::clone(&self.next_id),
                pending: Vec::new(),
            }))
        }

        async fn find_by_id(&self, id: i64) -> Result<Option<Organisation>, ServiceError> {
            Ok(self.committed.lock().unwrap().iter().find(|o| o.id == id).cloned())
        }

        async fn find_by_name(&self, name: &str) -> Result<Option<Organisation>, ServiceError> {
            Ok(self.committed.lock().unwrap().iter().find(|o| o.name == name).cloned())
        }
    }

    #[async_trait]
    impl OrganisationTxn for MockTxn {
        async fn insert(&mut self, name: &str) -> Result<Organisation, ServiceError> {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            let org = Organisation { id, name: name.to_string() };
            self.pending.push(org.clone());
            Ok(org)
        }

        async fn commit(self: Box<Self>) -> Result<(), ServiceError> {
            let MockTxn { committed, pending, .. } = *self;
            committed.lock().unwrap().extend(pending);
            Ok(())
        }

        async fn rollback(self: Box<Self>) -> Result<(), ServiceError> {
            Ok(())
        }
    }
}
