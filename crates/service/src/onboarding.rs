//! Binding accounts to organisations.
//!
//! Shared by password sign-up and the OAuth callback: invite redemption,
//! fallback organisation, membership, final overwrite and the session token.
//! Also moves a member out into an organisation of their own.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::account::domain::{NewUser, User};
use crate::account::AccountDirectory;
use crate::errors::ServiceError;
use crate::membership::MembershipLinker;
use crate::organisation::domain::Organisation;
use crate::organisation::OrganisationRegistry;
use crate::token::{InviteClaims, TokenCodec};

const MIN_PASSWORD_LEN: usize = 8;

/// Session issued by password sign-up or sign-in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PasswordSession {
    pub session_token: String,
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub organisation_id: i64,
}

pub struct Onboarding {
    tokens: Arc<TokenCodec>,
    accounts: Arc<AccountDirectory>,
    organisations: Arc<OrganisationRegistry>,
    memberships: Arc<MembershipLinker>,
}

impl Onboarding {
    pub fn new(
        tokens: Arc<TokenCodec>,
        accounts: Arc<AccountDirectory>,
        organisations: Arc<OrganisationRegistry>,
        memberships: Arc<MembershipLinker>,
    ) -> Self {
        Self { tokens, accounts, organisations, memberships }
    }

    pub fn tokens(&self) -> &TokenCodec { &self.tokens }

    pub fn accounts(&self) -> &AccountDirectory { &self.accounts }

    /// Give `user` an organisation: the invited one when the invite was
    /// issued for `email`, else the one they already have, else a new one.
    /// A membership row exists for the returned organisation.
    pub async fn bind_organisation(
        &self,
        user: User,
        email: &str,
        invite: Option<&InviteClaims>,
    ) -> Result<(User, i64), ServiceError> {
        let user = match invite {
            Some(claims) => self.redeem_invite(user, email, claims).await?,
            None => user,
        };
        match user.organisation_id {
            Some(id) => Ok((user, id)),
            None => self.provision_fallback(user).await,
        }
    }

    /// Persist `user` under `email` and issue its session token.
    pub async fn complete(&self, email: &str, user: &User) -> Result<String, ServiceError> {
        self.accounts.update_by_email(email, user).await?;
        self.tokens.encode_session(user.id, email)
    }

    /// Email and password registration.
    ///
    /// The account is named after its email. A non-empty `invite_token` must
    /// decode before anything is written; it binds the account to the invited
    /// organisation only when it was issued for this email.
    ///
    /// # Examples
    /// ```
    /// use service::account::{AccountDirectory, repository::mock::MockUserRepository};
    /// use service::membership::{MembershipLinker, repository::mock::MockMembershipRepository};
    /// use service::onboarding::Onboarding;
    /// use service::organisation::{OrganisationRegistry, provisioner::mock::StubProvisioner, repository::mock::MockOrganisationRepository};
    /// use service::token::{TokenCodec, TokenConfig};
    /// use std::sync::Arc;
    /// let onboarding = Onboarding::new(
    ///     Arc::new(TokenCodec::new(TokenConfig::with_secret("doc-secret-0123456789")).unwrap()),
    ///     Arc::new(AccountDirectory::new(Arc::new(MockUserRepository::default()))),
    ///     Arc::new(OrganisationRegistry::new(Arc::new(MockOrganisationRepository::default()), Arc::new(StubProvisioner::default()))),
    ///     Arc::new(MembershipLinker::new(Arc::new(MockMembershipRepository::default()))),
    /// );
    /// let session = tokio_test::block_on(onboarding.sign_up("new@example.com", "Passw0rd!", None)).unwrap();
    /// assert_eq!(session.name, "new@example.com");
    /// ```
    #[instrument(skip(self, password, invite_token), name = "Onboarding::sign_up")]
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        invite_token: Option<&str>,
    ) -> Result<PasswordSession, ServiceError> {
        if password.len() < MIN_PASSWORD_LEN {
            return Err(ServiceError::Validation(format!("password must be at least {MIN_PASSWORD_LEN} characters")));
        }
        let invite = match invite_token.filter(|t| !t.is_empty()) {
            Some(token) => Some(self.tokens.decode_invite(token)?),
            None => None,
        };

        let hash = AccountDirectory::hash_password(password)?;
        let user = self
            .accounts
            .create(NewUser { name: email.to_string(), email: email.to_string(), password_hash: hash })
            .await?;

        let (user, organisation_id) = self.bind_organisation(user, email, invite.as_ref()).await?;
        let session_token = self.complete(email, &user).await?;
        info!(user_id = user.id, organisation_id, "password_sign_up");

        Ok(PasswordSession { session_token, user_id: user.id, name: user.name, email: email.to_string(), organisation_id })
    }

    /// Unknown email and wrong password are the same `Validation` failure.
    #[instrument(skip(self, password), name = "Onboarding::sign_in")]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<PasswordSession, ServiceError> {
        let rejected = || ServiceError::Validation("invalid email or password".into());
        let user = match self.accounts.get_by_email(email).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => return Err(rejected()),
            Err(e) => return Err(e),
        };
        if !AccountDirectory::verify_password(password, &user.password_hash) {
            warn!(user_id = user.id, "password mismatch");
            return Err(rejected());
        }

        let (user, organisation_id) = self.bind_organisation(user, email, None).await?;
        let session_token = self.complete(email, &user).await?;
        info!(user_id = user.id, organisation_id, "password_sign_in");

        Ok(PasswordSession { session_token, user_id: user.id, name: user.name, email: email.to_string(), organisation_id })
    }

    /// Move `target_id` out of the caller's organisation into a freshly
    /// provisioned one.
    ///
    /// The caller needs an organisation and the target must be a member of
    /// it, otherwise `Forbidden`. The old membership row is left in place.
    #[instrument(skip(self), name = "Onboarding::remove_from_organisation")]
    pub async fn remove_from_organisation(&self, caller_id: i64, target_id: i64) -> Result<Organisation, ServiceError> {
        let Some(caller_org) = self.accounts.organisation_id_of(caller_id).await? else {
            return Err(ServiceError::Forbidden("caller has no organisation".into()));
        };
        let target = self.accounts.get_by_id(target_id).await?;
        if target.organisation_id != Some(caller_org) {
            return Err(ServiceError::Forbidden("user is not a member of the caller's organisation".into()));
        }

        let org = self.organisations.create_auto().await?;
        self.memberships.ensure_membership(target.id, org.id).await?;
        let email = target.email.clone();
        self.accounts.update_by_email(&email, &target.with_organisation(org.id)).await?;
        info!(user_id = target_id, from = caller_org, to = org.id, "member_removed");
        Ok(org)
    }

    /// A matching invite binds the user to the invited organisation, even
    /// when they already belong elsewhere. A mismatching one is ignored.
    async fn redeem_invite(&self, user: User, email: &str, claims: &InviteClaims) -> Result<User, ServiceError> {
        if claims.email() != email {
            warn!(user_id = user.id, invited_org = claims.organisation_id(), "invite email does not match primary email; ignoring invite");
            return Ok(user);
        }
        let organisation_id = claims.organisation_id();
        self.memberships.ensure_membership(user.id, organisation_id).await?;
        info!(user_id = user.id, organisation_id, "invite_redeemed");
        Ok(user.with_organisation(organisation_id))
    }

    async fn provision_fallback(&self, user: User) -> Result<(User, i64), ServiceError> {
        let org = self.organisations.create_auto().await?;
        self.memberships.ensure_membership(user.id, org.id).await?;
        Ok((user.with_organisation(org.id), org.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::repository::mock::MockUserRepository;
    use crate::membership::repository::mock::MockMembershipRepository;
    use crate::organisation::provisioner::mock::StubProvisioner;
    use crate::organisation::repository::mock::MockOrganisationRepository;
    use crate::token::TokenConfig;

    struct Fixture {
        onboarding: Onboarding,
        tokens: Arc<TokenCodec>,
        accounts: Arc<AccountDirectory>,
        users: Arc<MockUserRepository>,
        orgs: Arc<MockOrganisationRepository>,
        memberships: Arc<MockMembershipRepository>,
        provisioner: Arc<StubProvisioner>,
    }

    fn fixture() -> Fixture {
        let tokens = Arc::new(TokenCodec::new(TokenConfig::with_secret("onboarding-secret-0123")).unwrap());
        let users = Arc::new(MockUserRepository::default());
        let orgs = Arc::new(MockOrganisationRepository::default());
        let memberships = Arc::new(MockMembershipRepository::default());
        let provisioner = Arc::new(StubProvisioner::default());
        let accounts = Arc::new(AccountDirectory::new(users.clone()));
        let onboarding = Onboarding::new(
            tokens.clone(),
            accounts.clone(),
            Arc::new(OrganisationRegistry::new(orgs.clone(), provisioner.clone())),
            Arc::new(MembershipLinker::new(memberships.clone())),
        );
        Fixture { onboarding, tokens, accounts, users, orgs, memberships, provisioner }
    }

    #[tokio::test]
    async fn sign_up_without_invite_gets_own_organisation() {
        let f = fixture();
        let out = f.onboarding.sign_up("new@example.com", "Passw0rd!", None).await.unwrap();

        assert_eq!(out.name, "new@example.com");
        assert_eq!(f.orgs.count(), 1);
        assert_eq!(f.memberships.count(), 1);
        let user = f.accounts.get_by_email("new@example.com").await.unwrap();
        assert_eq!(user.organisation_id, Some(out.organisation_id));
        assert!(AccountDirectory::verify_password("Passw0rd!", &user.password_hash));
        assert_eq!(f.tokens.decode_session(&out.session_token).unwrap().user_id(), user.id);
    }

    #[tokio::test]
    async fn sign_up_with_matching_invite_joins_invited_organisation() {
        let f = fixture();
        let invite = f.tokens.encode_invite(9, "new@example.com").unwrap();
        let out = f.onboarding.sign_up("new@example.com", "Passw0rd!", Some(&invite)).await.unwrap();

        assert_eq!(out.organisation_id, 9);
        assert_eq!(f.orgs.count(), 0);
        assert_eq!(f.memberships.count_for_user(out.user_id), 1);
    }

    #[tokio::test]
    async fn sign_up_with_foreign_invite_falls_back() {
        let f = fixture();
        let invite = f.tokens.encode_invite(9, "someone@else.com").unwrap();
        let out = f.onboarding.sign_up("new@example.com", "Passw0rd!", Some(&invite)).await.unwrap();

        assert_ne!(out.organisation_id, 9);
        assert_eq!(f.orgs.count(), 1);
    }

    #[tokio::test]
    async fn sign_up_with_corrupt_invite_writes_nothing() {
        let f = fixture();
        let err = f.onboarding.sign_up("new@example.com", "Passw0rd!", Some("garbage")).await.unwrap_err();

        assert!(matches!(err, ServiceError::Decode(_)));
        assert_eq!(f.users.count(), 0);
        assert_eq!(f.orgs.count(), 0);
    }

    #[tokio::test]
    async fn sign_up_rejects_short_password_and_taken_email() {
        let f = fixture();
        assert!(matches!(f.onboarding.sign_up("a@example.com", "short", None).await, Err(ServiceError::Validation(_))));

        f.onboarding.sign_up("a@example.com", "Passw0rd!", None).await.unwrap();
        let err = f.onboarding.sign_up("a@example.com", "Other-pass1", None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert_eq!(f.users.count(), 1);
    }

    #[tokio::test]
    async fn sign_in_checks_password_and_keeps_organisation() {
        let f = fixture();
        let up = f.onboarding.sign_up("a@example.com", "Passw0rd!", None).await.unwrap();

        let again = f.onboarding.sign_in("a@example.com", "Passw0rd!").await.unwrap();
        assert_eq!(again.organisation_id, up.organisation_id);
        assert_eq!(f.orgs.count(), 1);

        assert!(matches!(f.onboarding.sign_in("a@example.com", "wrong-pass").await, Err(ServiceError::Validation(_))));
        assert!(matches!(f.onboarding.sign_in("ghost@example.com", "Passw0rd!").await, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn removed_member_lands_in_new_organisation() {
        let f = fixture();
        let owner = f.onboarding.sign_up("owner@example.com", "Passw0rd!", None).await.unwrap();
        let invite = f.tokens.encode_invite(owner.organisation_id, "member@example.com").unwrap();
        let member = f.onboarding.sign_up("member@example.com", "Passw0rd!", Some(&invite)).await.unwrap();
        assert_eq!(member.organisation_id, owner.organisation_id);

        let org = f.onboarding.remove_from_organisation(owner.user_id, member.user_id).await.unwrap();
        assert_ne!(org.id, owner.organisation_id);
        assert_eq!(f.accounts.organisation_id_of(member.user_id).await.unwrap(), Some(org.id));
        assert_eq!(f.accounts.organisation_id_of(owner.user_id).await.unwrap(), Some(owner.organisation_id));
        assert_eq!(f.memberships.count_for_user(member.user_id), 2);
    }

    #[tokio::test]
    async fn removal_is_limited_to_own_organisation() {
        let f = fixture();
        let a = f.onboarding.sign_up("a@example.com", "Passw0rd!", None).await.unwrap();
        let b = f.onboarding.sign_up("b@example.com", "Passw0rd!", None).await.unwrap();

        let err = f.onboarding.remove_from_organisation(a.user_id, b.user_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
        assert!(f.onboarding.remove_from_organisation(a.user_id, 999).await.unwrap_err().is_not_found());
        assert_eq!(f.orgs.count(), 2);
    }

    #[tokio::test]
    async fn caller_without_organisation_is_forbidden() {
        let f = fixture();
        let lone = f.accounts.create_federated("lone", "lone@example.com").await.unwrap();
        let err = f.onboarding.remove_from_organisation(lone.id, lone.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn failed_provisioning_keeps_member_in_place() {
        let f = fixture();
        let owner = f.onboarding.sign_up("owner@example.com", "Passw0rd!", None).await.unwrap();
        f.provisioner.set_failing(true);

        let err = f.onboarding.remove_from_organisation(owner.user_id, owner.user_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Remote(_)));
        assert_eq!(f.accounts.organisation_id_of(owner.user_id).await.unwrap(), Some(owner.organisation_id));
    }
}
