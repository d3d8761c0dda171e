use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use super::domain::Membership;
use super::repository::MembershipRepository;
use crate::errors::ServiceError;

type PairLocks = DashMap<(i64, i64), Arc<Mutex<()>>>;

/// Links users to organisations, at most once per pair.
///
/// Check-then-create is serialised per `(user_id, organisation_id)` inside
/// this process; the unique index on the table covers other processes, and a
/// lost race there is resolved by re-reading the winner's row.
pub struct MembershipLinker {
    repo: Arc<dyn MembershipRepository>,
    locks: PairLocks,
}

impl MembershipLinker {
    pub fn new(repo: Arc<dyn MembershipRepository>) -> Self {
        Self { repo, locks: DashMap::new() }
    }

    /// Return the membership for the pair, creating an active one if absent.
    ///
    /// # Examples
    /// ```
    /// use service::membership::{MembershipLinker, repository::mock::MockMembershipRepository};
    /// use std::sync::Arc;
    /// let linker = MembershipLinker::new(Arc::new(MockMembershipRepository::default()));
    /// let first = tokio_test::block_on(linker.ensure_membership(1, 5)).unwrap();
    /// let again = tokio_test::block_on(linker.ensure_membership(1, 5)).unwrap();
    /// assert_eq!(first.id, again.id);
    /// assert!(again.is_active);
    /// ```
    #[instrument(skip(self))]
    pub async fn ensure_membership(&self, user_id: i64, organisation_id: i64) -> Result<Membership, ServiceError> {
        if user_id <= 0 || organisation_id <= 0 {
            return Err(ServiceError::Validation("membership needs positive user and organisation ids".into()));
        }
        let key = (user_id, organisation_id);
        let lock = self.locks.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))).clone();
        let result = {
            let _guard = lock.lock().await;
            self.find_or_create(user_id, organisation_id).await
        };
        drop(lock);
        // only the map still holds it: nobody else is waiting on this pair
        self.locks.remove_if(&key, |_, l| Arc::strong_count(l) == 1);
        result
    }

    async fn find_or_create(&self, user_id: i64, organisation_id: i64) -> Result<Membership, ServiceError> {
        if let Some(existing) = self.repo.find(user_id, organisation_id).await? {
            debug!(membership_id = existing.id, "membership exists");
            return Ok(existing);
        }
        match self.repo.create(user_id, organisation_id).await {
            Ok(created) => {
                info!(membership_id = created.id, user_id, organisation_id, "membership_created");
                Ok(created)
            }
            Err(ServiceError::Conflict(msg)) => {
                debug!(%msg, "membership created concurrently; re-reading");
                self.repo
                    .find(user_id, organisation_id)
                    .await?
                    .ok_or_else(|| ServiceError::Conflict(msg))
            }
            Err(e) => Err(e),
        }
    }

    /// Number of pairs with an in-flight `ensure_membership`.
    pub fn pending_locks(&self) -> usize {
        self.locks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::repository::mock::MockMembershipRepository;
    use async_trait::async_trait;

    #[tokio::test]
    async fn repeated_calls_return_same_row() {
        let repo = Arc::new(MockMembershipRepository::default());
        let linker = MembershipLinker::new(repo.clone());
        let a = linker.ensure_membership(1, 2).await.unwrap();
        let b = linker.ensure_membership(1, 2).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(repo.count(), 1);
        assert_eq!(linker.pending_locks(), 0);
    }

    #[tokio::test]
    async fn distinct_pairs_get_distinct_rows() {
        let repo = Arc::new(MockMembershipRepository::default());
        let linker = MembershipLinker::new(repo.clone());
        linker.ensure_membership(1, 2).await.unwrap();
        linker.ensure_membership(1, 3).await.unwrap();
        linker.ensure_membership(4, 2).await.unwrap();
        assert_eq!(repo.count(), 3);
        assert_eq!(repo.count_for_user(1), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_calls_create_one_row() {
        let repo = Arc::new(MockMembershipRepository::default());
        let linker = Arc::new(MembershipLinker::new(repo.clone()));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let linker = Arc::clone(&linker);
                tokio::spawn(async move { linker.ensure_membership(9, 9).await })
            })
            .collect();
        let mut ids = Vec::new();
        for h in handles {
            ids.push(h.await.unwrap().unwrap().id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(repo.count(), 1);
        assert_eq!(linker.pending_locks(), 0);
    }

    #[tokio::test]
    async fn rejects_non_positive_ids() {
        let linker = MembershipLinker::new(Arc::new(MockMembershipRepository::default()));
        assert!(matches!(linker.ensure_membership(0, 1).await, Err(ServiceError::Validation(_))));
        assert!(matches!(linker.ensure_membership(1, -1).await, Err(ServiceError::Validation(_))));
    }

    /// Repository whose first `find` misses even though another writer
    /// already inserted the row, as happens across processes.
    struct RacingRepo {
        inner: MockMembershipRepository,
        raced: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl MembershipRepository for RacingRepo {
        async fn find(&self, user_id: i64, organisation_id: i64) -> Result<Option<Membership>, ServiceError> {
            if !self.raced.swap(true, std::sync::atomic::Ordering::SeqCst) {
                self.inner.create(user_id, organisation_id).await?;
                return Ok(None);
            }
            self.inner.find(user_id, organisation_id).await
        }

        async fn create(&self, user_id: i64, organisation_id: i64) -> Result<Membership, ServiceError> {
            self.inner.create(user_id, organisation_id).await
        }
    }

    #[tokio::test]
    async fn lost_race_rereads_winner() {
        let repo = Arc::new(RacingRepo { inner: MockMembershipRepository::default(), raced: Default::default() });
        let linker = MembershipLinker::new(repo.clone());
        let m = linker.ensure_membership(3, 4).await.unwrap();
        assert_eq!(m.id, 1);
        assert_eq!(repo.inner.count(), 1);
    }
}
