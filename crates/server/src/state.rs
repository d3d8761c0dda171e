use std::sync::Arc;

use service::account::AccountDirectory;
use service::invitation::InvitationDispatcher;
use service::oauth::FederationFlow;
use service::onboarding::Onboarding;
use service::token::TokenCodec;

pub const AUTH_COOKIE: &str = "auth_token";

/// Shared handler state; every field is cheap to clone.
#[derive(Clone)]
pub struct ServerState {
    pub flow: Arc<FederationFlow>,
    pub onboarding: Arc<Onboarding>,
    pub invitations: Arc<InvitationDispatcher>,
    pub accounts: Arc<AccountDirectory>,
    pub tokens: Arc<TokenCodec>,
    /// Frontend URL without trailing slash; all redirects land here.
    pub app_url: String,
}

impl ServerState {
    /// Session cookies are `Secure` whenever the frontend is served over TLS.
    pub fn secure_cookies(&self) -> bool {
        self.app_url.starts_with("https://")
    }
}
