use std::sync::Arc;

use rand::Rng;
use tracing::{info, instrument, warn};

use super::domain::Organisation;
use super::provisioner::WorkspaceProvisioner;
use super::repository::OrganisationRepository;
use crate::errors::ServiceError;

const NAME_PREFIX: &str = "Organisation_";

/// Organisation registry.
///
/// Generated names are not checked for uniqueness; two organisations may
/// share a name and lookups by name return the first match.
pub struct OrganisationRegistry {
    repo: Arc<dyn OrganisationRepository>,
    provisioner: Arc<dyn WorkspaceProvisioner>,
}

impl OrganisationRegistry {
    pub fn new(repo: Arc<dyn OrganisationRepository>, provisioner: Arc<dyn WorkspaceProvisioner>) -> Self {
        Self { repo, provisioner }
    }

    /// `Organisation_` followed by a zero-padded number in `000..=999`.
    pub fn generate_name() -> String {
        let n: u16 = rand::thread_rng().gen_range(0..1000);
        format!("{NAME_PREFIX}{n:03}")
    }

    /// Insert the organisation and provision its workspace as one unit.
    ///
    /// The row is committed only after the workspace API accepted the
    /// project; on any failure the transaction is rolled back and the
    /// organisation does not exist.
    ///
    /// # Examples
    /// ```
    /// use service::organisation::{OrganisationRegistry, provisioner::mock::StubProvisioner, repository::mock::MockOrganisationRepository};
    /// use std::sync::Arc;
    /// let registry = OrganisationRegistry::new(Arc::new(MockOrganisationRepository::default()), Arc::new(StubProvisioner::default()));
    /// let org = tokio_test::block_on(registry.create("Organisation_001")).unwrap();
    /// assert_eq!(tokio_test::block_on(registry.get_by_name("Organisation_001")).unwrap().id, org.id);
    /// ```
    #[instrument(skip(self))]
    pub async fn create(&self, name: &str) -> Result<Organisation, ServiceError> {
        if name.trim().is_empty() {
            return Err(ServiceError::Validation("organisation name required".into()));
        }
        let mut txn = self.repo.begin().await?;
        let org = match txn.insert(name).await {
            Ok(org) => org,
            Err(e) => {
                if let Err(rb) = txn.rollback().await {
                    warn!(err = %rb, "rollback after failed insert failed");
                }
                return Err(e);
            }
        };

        match self.provisioner.create_project(&org.project_name(), &org.project_description()).await {
            Ok(project) => {
                txn.commit().await?;
                info!(organisation_id = org.id, name = %org.name, project = %project.identifier, "organisation_created");
                Ok(org)
            }
            Err(e) => {
                warn!(organisation_id = org.id, err = %e, "workspace provisioning failed; rolling back organisation");
                if let Err(rb) = txn.rollback().await {
                    warn!(err = %rb, "rollback after failed provisioning failed");
                }
                Err(e)
            }
        }
    }

    /// Create an organisation under a freshly generated name.
    pub async fn create_auto(&self) -> Result<Organisation, ServiceError> {
        self.create(&Self::generate_name()).await
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Organisation, ServiceError> {
        self.repo.find_by_id(id).await?.ok_or_else(|| ServiceError::not_found("organisation"))
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Organisation, ServiceError> {
        self.repo.find_by_name(name).await?.ok_or_else(|| ServiceError::not_found("organisation"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::organisation::provisioner::mock::StubProvisioner;
    use crate::organisation::repository::mock::MockOrganisationRepository;

    fn registry(provisioner: Arc<StubProvisioner>) -> (OrganisationRegistry, Arc<MockOrganisationRepository>) {
        let repo = Arc::new(MockOrganisationRepository::default());
        (OrganisationRegistry::new(repo.clone(), provisioner), repo)
    }

    #[test]
    fn generated_names_have_fixed_format() {
        for _ in 0..200 {
            let name = OrganisationRegistry::generate_name();
            let suffix = name.strip_prefix("Organisation_").expect("prefix");
            assert_eq!(suffix.len(), 3);
            assert!(suffix.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn create_provisions_workspace_and_commits() {
        let stub = Arc::new(StubProvisioner::default());
        let (registry, repo) = registry(stub.clone());

        let org = registry.create("Organisation_123").await.unwrap();
        assert_eq!(repo.count(), 1);
        assert_eq!(registry.get_by_id(org.id).await.unwrap(), org);
        assert_eq!(stub.calls(), vec![(org.project_name(), org.project_description())]);
    }

    #[tokio::test]
    async fn failed_provisioning_leaves_no_organisation() {
        let stub = Arc::new(StubProvisioner::failing());
        let (registry, repo) = registry(stub.clone());

        let err = registry.create("Organisation_404").await.unwrap_err();
        assert!(matches!(err, ServiceError::Remote(_)));
        assert!(registry.get_by_name("Organisation_404").await.unwrap_err().is_not_found());
        assert_eq!(repo.count(), 0);
        assert_eq!(stub.calls().len(), 1);
    }

    #[tokio::test]
    async fn recovers_after_provisioning_comes_back() {
        let stub = Arc::new(StubProvisioner::failing());
        let (registry, repo) = registry(stub.clone());
        assert!(registry.create_auto().await.is_err());

        stub.set_failing(false);
        let org = registry.create_auto().await.unwrap();
        assert!(org.name.starts_with("Organisation_"));
        assert_eq!(repo.count(), 1);
    }

    #[tokio::test]
    async fn duplicate_names_are_allowed() {
        let (registry, repo) = registry(Arc::new(StubProvisioner::default()));
        let a = registry.create("Organisation_007").await.unwrap();
        let b = registry.create("Organisation_007").await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(repo.count(), 2);
        assert_eq!(registry.get_by_name("Organisation_007").await.unwrap().id, a.id);
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let (registry, _) = registry(Arc::new(StubProvisioner::default()));
        assert!(matches!(registry.create("  ").await, Err(ServiceError::Validation(_))));
    }
}
