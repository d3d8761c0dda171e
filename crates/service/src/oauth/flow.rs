use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::provider::{OAuthProvider, ProviderEmail};
use crate::account::domain::User;
use crate::errors::ServiceError;
use crate::onboarding::Onboarding;

/// Display name used when the provider profile has no login.
const UNKNOWN_NAME: &str = "N/A";

/// Result of a completed federated sign-in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FederationOutcome {
    pub session_token: String,
    pub name: String,
    pub email: String,
    /// Whether the account existed before this sign-in.
    pub existing_account: bool,
    pub organisation_id: i64,
}

/// OAuth callback handling.
///
/// Turns an authorization code and the returned `state` into one consistent
/// user, organisation, membership and session token. The invite carried in
/// `state` is verified before anything is written, so a corrupt invite never
/// leaves a half-provisioned account behind.
pub struct FederationFlow {
    provider: Arc<dyn OAuthProvider>,
    onboarding: Arc<Onboarding>,
}

impl FederationFlow {
    pub fn new(provider: Arc<dyn OAuthProvider>, onboarding: Arc<Onboarding>) -> Self {
        Self { provider, onboarding }
    }

    pub fn provider(&self) -> &dyn OAuthProvider {
        self.provider.as_ref()
    }

    #[instrument(skip(self, code, state), name = "FederationFlow::handle_callback")]
    pub async fn handle_callback(&self, code: &str, state: &str) -> Result<FederationOutcome, ServiceError> {
        let access = self.provider.exchange_code(code).await?;

        let profile = self.provider.fetch_user(&access).await?;
        let emails = self.provider.fetch_emails(&access).await?;
        let primary = primary_email(&emails)?;
        let name = if profile.login.trim().is_empty() { UNKNOWN_NAME.to_string() } else { profile.login.clone() };

        let invite = self.onboarding.tokens().decode_invite_state(state)?;

        let (user, existing_account) = self.reconcile_account(&name, &primary).await?;
        let user = user.with_name(name.clone());

        let (user, organisation_id) = self.onboarding.bind_organisation(user, &primary, invite.as_ref()).await?;
        let session_token = self.onboarding.complete(&primary, &user).await?;
        info!(user_id = user.id, organisation_id, existing_account, "federated_sign_in");

        Ok(FederationOutcome { session_token, name, email: primary, existing_account, organisation_id })
    }

    /// Existing account for `email`, or a new federated one. Losing a
    /// concurrent first sign-in for the same email counts as existing.
    async fn reconcile_account(&self, name: &str, email: &str) -> Result<(User, bool), ServiceError> {
        let accounts = self.onboarding.accounts();
        match accounts.get_by_email(email).await {
            Ok(user) => {
                debug!(user_id = user.id, "existing account");
                Ok((user, true))
            }
            Err(e) if e.is_not_found() => match accounts.create_federated(name, email).await {
                Ok(user) => Ok((user, false)),
                Err(ServiceError::Conflict(msg)) => {
                    debug!(%msg, "account created concurrently; re-reading");
                    Ok((accounts.get_by_email(email).await?, true))
                }
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        }
    }
}

fn primary_email(emails: &[ProviderEmail]) -> Result<String, ServiceError> {
    let primary = emails
        .iter()
        .find(|e| e.primary)
        .ok_or_else(|| ServiceError::Validation("no primary email".into()))?;
    if !primary.verified {
        warn!("primary email is not verified by the provider");
    }
    Ok(primary.email.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::account::domain::NewUser;
    use crate::account::repository::{mock::MockUserRepository, UserRepository};
    use crate::account::AccountDirectory;
    use crate::membership::{repository::mock::MockMembershipRepository, MembershipLinker};
    use crate::oauth::provider::mock::MockOAuthProvider;
    use crate::organisation::provisioner::mock::StubProvisioner;
    use crate::organisation::repository::mock::MockOrganisationRepository;
    use crate::organisation::OrganisationRegistry;
    use crate::token::{TokenCodec, TokenConfig};

    struct Harness {
        flow: FederationFlow,
        provider: Arc<MockOAuthProvider>,
        tokens: Arc<TokenCodec>,
        accounts: Arc<AccountDirectory>,
        users: Arc<MockUserRepository>,
        orgs: Arc<MockOrganisationRepository>,
        memberships: Arc<MockMembershipRepository>,
        provisioner: Arc<StubProvisioner>,
    }

    fn harness(login: &str, email: &str) -> Harness {
        let provider = Arc::new(MockOAuthProvider::with_identity(login, email));
        let tokens = Arc::new(TokenCodec::new(TokenConfig::with_secret("flow-test-secret-0123")).unwrap());
        let users = Arc::new(MockUserRepository::default());
        let orgs = Arc::new(MockOrganisationRepository::default());
        let memberships = Arc::new(MockMembershipRepository::default());
        let provisioner = Arc::new(StubProvisioner::default());
        let accounts = Arc::new(AccountDirectory::new(users.clone()));
        let flow = flow_over(provider.clone(), tokens.clone(), accounts.clone(), orgs.clone(), provisioner.clone(), memberships.clone());
        Harness { flow, provider, tokens, accounts, users, orgs, memberships, provisioner }
    }

    fn flow_over(
        provider: Arc<MockOAuthProvider>,
        tokens: Arc<TokenCodec>,
        accounts: Arc<AccountDirectory>,
        orgs: Arc<MockOrganisationRepository>,
        provisioner: Arc<StubProvisioner>,
        memberships: Arc<MockMembershipRepository>,
    ) -> FederationFlow {
        let onboarding = Onboarding::new(
            tokens,
            accounts,
            Arc::new(OrganisationRegistry::new(orgs, provisioner)),
            Arc::new(MembershipLinker::new(memberships)),
        );
        FederationFlow::new(provider, Arc::new(onboarding))
    }

    /// Another request registers the same email just before our insert.
    struct RacingUsers {
        inner: MockUserRepository,
    }

    #[async_trait]
    impl UserRepository for RacingUsers {
        async fn find_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
            self.inner.find_by_email(email).await
        }

        async fn find_by_id(&self, id: i64) -> Result<Option<User>, ServiceError> {
            self.inner.find_by_id(id).await
        }

        async fn create(&self, user: NewUser) -> Result<User, ServiceError> {
            let winner = NewUser { name: "winner".into(), email: user.email.clone(), password_hash: "h".into() };
            self.inner.create(winner).await?;
            self.inner.create(user).await
        }

        async fn update_by_email(&self, email: &str, user: &User) -> Result<bool, ServiceError> {
            self.inner.update_by_email(email, user).await
        }
    }

    fn invite_state(h: &Harness, org: i64, email: &str) -> String {
        TokenCodec::invite_state(&h.tokens.encode_invite(org, email).unwrap())
    }

    #[tokio::test]
    async fn first_sign_in_creates_account_and_organisation() {
        let h = harness("octocat", "octo@example.com");
        let out = h.flow.handle_callback("code-1", "nonce").await.unwrap();

        assert!(!out.existing_account);
        assert_eq!(out.name, "octocat");
        assert_eq!(out.email, "octo@example.com");
        assert_eq!(h.users.count(), 1);
        assert_eq!(h.orgs.count(), 1);
        assert_eq!(h.memberships.count(), 1);

        let user = h.accounts.get_by_email("octo@example.com").await.unwrap();
        assert_eq!(user.organisation_id, Some(out.organisation_id));
        assert!(user.password_hash.starts_with("$argon2"));
        let session = h.tokens.decode_session(&out.session_token).unwrap();
        assert_eq!(session.user_id(), user.id);
        assert_eq!(session.email(), "octo@example.com");
    }

    #[tokio::test]
    async fn reconciliation_is_idempotent() {
        let h = harness("octocat", "octo@example.com");
        let first = h.flow.handle_callback("c1", "nonce").await.unwrap();
        let second = h.flow.handle_callback("c2", "nonce").await.unwrap();

        assert!(second.existing_account);
        assert_eq!(first.organisation_id, second.organisation_id);
        assert_eq!(h.users.count(), 1);
        assert_eq!(h.orgs.count(), 1);
        assert_eq!(h.memberships.count(), 1);
    }

    #[tokio::test]
    async fn matching_invite_takes_precedence() {
        let h = harness("invitee", "user@x.com");
        let state = invite_state(&h, 5, "user@x.com");
        let out = h.flow.handle_callback("code", &state).await.unwrap();

        assert_eq!(out.organisation_id, 5);
        assert_eq!(h.orgs.count(), 0);
        assert_eq!(h.memberships.count_for_user(1), 1);
        assert_eq!(h.accounts.get_by_email("user@x.com").await.unwrap().organisation_id, Some(5));
    }

    #[tokio::test]
    async fn invite_moves_existing_member() {
        let h = harness("mover", "user@x.com");
        let before = h.flow.handle_callback("c1", "nonce").await.unwrap();
        assert_ne!(before.organisation_id, 5);

        let out = h.flow.handle_callback("c2", &invite_state(&h, 5, "user@x.com")).await.unwrap();
        assert!(out.existing_account);
        assert_eq!(out.organisation_id, 5);
        assert_eq!(h.memberships.count_for_user(1), 2);
    }

    #[tokio::test]
    async fn mismatched_invite_falls_back_to_new_organisation() {
        let h = harness("someone", "someone@else.com");
        let out = h.flow.handle_callback("code", &invite_state(&h, 5, "user@x.com")).await.unwrap();

        assert_ne!(out.organisation_id, 5);
        assert_eq!(h.orgs.count(), 1);
        assert_eq!(h.memberships.count(), 1);
    }

    #[tokio::test]
    async fn malformed_invite_aborts_without_writes() {
        let h = harness("octocat", "octo@example.com");
        let err = h.flow.handle_callback("code", "token:not-a-jwt").await.unwrap_err();

        assert!(matches!(err, ServiceError::Decode(_)));
        assert_eq!(h.users.count(), 0);
        assert_eq!(h.orgs.count(), 0);
        assert_eq!(h.memberships.count(), 0);
    }

    #[tokio::test]
    async fn missing_primary_email_is_validation_error() {
        let h = harness("octocat", "octo@example.com");
        h.provider.set_emails(vec![ProviderEmail { email: "alt@example.com".into(), primary: false, verified: true }]);
        let err = h.flow.handle_callback("code", "nonce").await.unwrap_err();

        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(h.users.count(), 0);
        assert_eq!(h.orgs.count(), 0);
    }

    #[tokio::test]
    async fn exchange_failure_is_terminal() {
        let h = harness("octocat", "octo@example.com");
        h.provider.reject_codes(true);
        let err = h.flow.handle_callback("code", "nonce").await.unwrap_err();

        assert!(matches!(err, ServiceError::Remote(_)));
        assert_eq!(h.provider.exchanges(), 1);
        assert_eq!(h.users.count(), 0);
    }

    #[tokio::test]
    async fn provisioning_failure_surfaces_and_leaves_no_organisation() {
        let h = harness("octocat", "octo@example.com");
        h.provisioner.set_failing(true);
        let err = h.flow.handle_callback("code", "nonce").await.unwrap_err();

        assert!(matches!(err, ServiceError::Remote(_)));
        assert_eq!(h.orgs.count(), 0);
        assert_eq!(h.memberships.count(), 0);
        let user = h.accounts.get_by_email("octo@example.com").await.unwrap();
        assert_eq!(user.organisation_id, None);
    }

    #[tokio::test]
    async fn name_is_refreshed_and_blank_login_becomes_placeholder() {
        let h = harness("old-login", "octo@example.com");
        h.flow.handle_callback("c1", "nonce").await.unwrap();

        h.provider.set_login("new-login");
        h.flow.handle_callback("c2", "nonce").await.unwrap();
        assert_eq!(h.accounts.get_by_email("octo@example.com").await.unwrap().name, "new-login");

        h.provider.set_login("");
        let out = h.flow.handle_callback("c3", "nonce").await.unwrap();
        assert_eq!(out.name, "N/A");
    }

    #[tokio::test]
    async fn lost_account_race_continues_as_existing() {
        let provider = Arc::new(MockOAuthProvider::with_identity("octocat", "octo@example.com"));
        let tokens = Arc::new(TokenCodec::new(TokenConfig::with_secret("flow-test-secret-0123")).unwrap());
        let users = Arc::new(RacingUsers { inner: MockUserRepository::default() });
        let accounts = Arc::new(AccountDirectory::new(users.clone()));
        let memberships = Arc::new(MockMembershipRepository::default());
        let flow = flow_over(
            provider,
            tokens,
            accounts.clone(),
            Arc::new(MockOrganisationRepository::default()),
            Arc::new(StubProvisioner::default()),
            memberships.clone(),
        );

        let out = flow.handle_callback("code", "nonce").await.unwrap();
        assert!(out.existing_account);
        assert_eq!(users.inner.count(), 1);
        assert_eq!(memberships.count(), 1);
        let stored = accounts.get_by_email("octo@example.com").await.unwrap();
        assert_eq!(stored.name, "octocat");
        assert_eq!(stored.organisation_id, Some(out.organisation_id));
    }
}
