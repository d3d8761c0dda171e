//! GitHub OAuth 2.0 adapter.
//!
//! Authorization code flow: redirect to the authorize URL, exchange the
//! returned code at the token endpoint, then read `/user` and `/user/emails`
//! with the access token. All requests share one client with a timeout.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::provider::{AccessToken, OAuthProvider, ProviderEmail, ProviderUser};
use crate::errors::ServiceError;

pub const DEFAULT_OAUTH_BASE_URL: &str = "https://github.com";
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

#[derive(Clone)]
pub struct GitHubOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub timeout: Duration,
    /// Serves `/login/oauth/authorize` and `/login/oauth/access_token`.
    pub oauth_base_url: String,
    /// Serves `/user` and `/user/emails`.
    pub api_base_url: String,
}

impl GitHubOAuthConfig {
    /// Config against github.com.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
        scopes: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            scopes,
            timeout,
            oauth_base_url: DEFAULT_OAUTH_BASE_URL.into(),
            api_base_url: DEFAULT_API_BASE_URL.into(),
        }
    }

    /// Override both hosts, e.g. with a local fake server.
    pub fn with_base_urls(mut self, oauth_base_url: impl Into<String>, api_base_url: impl Into<String>) -> Self {
        self.oauth_base_url = oauth_base_url.into();
        self.api_base_url = api_base_url.into();
        self
    }

    pub fn scopes_string(&self) -> String {
        self.scopes.join(" ")
    }
}

/// Token endpoint success body.
#[derive(Debug, Deserialize)]
pub struct GitHubTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub scope: String,
}

/// GitHub answers a bad code with 200 and this body.
#[derive(Debug, Deserialize)]
struct GitHubErrorResponse {
    error: String,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GitHubUser {
    pub id: i64,
    pub login: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GitHubEmail {
    pub email: String,
    pub primary: bool,
    pub verified: bool,
}

pub struct GitHubOAuthClient {
    config: GitHubOAuthConfig,
    authorize_base: Url,
    token_url: String,
    user_url: String,
    emails_url: String,
    http: reqwest::Client,
}

impl GitHubOAuthClient {
    #[instrument(skip_all, name = "GitHubOAuthClient::new")]
    pub fn new(config: GitHubOAuthConfig) -> Result<Self, ServiceError> {
        if config.client_id.is_empty() || config.client_secret.is_empty() {
            return Err(ServiceError::Validation("github client id and secret are required".into()));
        }
        let oauth_base = config.oauth_base_url.trim_end_matches('/');
        let api_base = config.api_base_url.trim_end_matches('/');
        let authorize_base = Url::parse(&format!("{oauth_base}/login/oauth/authorize"))
            .map_err(|e| ServiceError::Validation(format!("authorize url: {e}")))?;
        let token_url = format!("{oauth_base}/login/oauth/access_token");
        let user_url = format!("{api_base}/user");
        let emails_url = format!("{api_base}/user/emails");
        let http = common::http::client_with_timeout(config.timeout)?;
        Ok(Self { config, authorize_base, token_url, user_url, emails_url, http })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str, token: &AccessToken) -> Result<T, ServiceError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(token.expose())
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, url, "GitHub API request failed");
            return Err(ServiceError::Remote(format!("GitHub API returned {status}: {body}")));
        }
        response
            .json()
            .await
            .map_err(|e| ServiceError::Remote(format!("failed to parse GitHub response: {e}")))
    }
}

#[async_trait]
impl OAuthProvider for GitHubOAuthClient {
    fn authorization_url(&self, state: &str) -> String {
        let mut url = self.authorize_base.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", &self.config.scopes_string())
            .append_pair("state", state);
        url.to_string()
    }

    #[instrument(skip(self, code), name = "GitHubOAuthClient::exchange_code")]
    async fn exchange_code(&self, code: &str) -> Result<AccessToken, ServiceError> {
        debug!("exchanging authorization code for access token");
        let response = self
            .http
            .post(&self.token_url)
            .header("Accept", "application/json")
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ServiceError::Remote(format!("token endpoint returned {status}")));
        }
        parse_token_response(&body).map(|t| AccessToken::new(t.access_token))
    }

    #[instrument(skip_all, name = "GitHubOAuthClient::fetch_user")]
    async fn fetch_user(&self, token: &AccessToken) -> Result<ProviderUser, ServiceError> {
        let user: GitHubUser = self.get_json(&self.user_url, token).await?;
        debug!(github_id = user.id, login = %user.login, "fetched GitHub user");
        Ok(ProviderUser { id: user.id, login: user.login, name: user.name })
    }

    #[instrument(skip_all, name = "GitHubOAuthClient::fetch_emails")]
    async fn fetch_emails(&self, token: &AccessToken) -> Result<Vec<ProviderEmail>, ServiceError> {
        let emails: Vec<GitHubEmail> = self.get_json(&self.emails_url, token).await?;
        debug!(count = emails.len(), "fetched GitHub emails");
        Ok(emails
            .into_iter()
            .map(|e| ProviderEmail { email: e.email, primary: e.primary, verified: e.verified })
            .collect())
    }
}

/// Decode the token endpoint body straight into its typed shape; an error
/// body or a missing token is a remote failure.
fn parse_token_response(body: &str) -> Result<GitHubTokenResponse, ServiceError> {
    if let Ok(err) = serde_json::from_str::<GitHubErrorResponse>(body) {
        let detail = err.error_description.unwrap_or_default();
        return Err(ServiceError::Remote(format!("GitHub OAuth error {}: {}", err.error, detail)));
    }
    let token: GitHubTokenResponse = serde_json::from_str(body)
        .map_err(|e| ServiceError::Remote(format!("failed to parse token response: {e}")))?;
    if token.access_token.is_empty() {
        return Err(ServiceError::Remote("token response carried an empty access token".into()));
    }
    Ok(token)
}
