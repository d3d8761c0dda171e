use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

/// Access token returned by a code exchange. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self { Self(value.into()) }

    pub fn expose(&self) -> &str { &self.0 }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderUser {
    pub id: i64,
    pub login: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderEmail {
    pub email: String,
    pub primary: bool,
    pub verified: bool,
}

/// Third-party identity provider speaking the authorization-code grant.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    fn authorization_url(&self, state: &str) -> String;
    async fn exchange_code(&self, code: &str) -> Result<AccessToken, ServiceError>;
    async fn fetch_user(&self, token: &AccessToken) -> Result<ProviderUser, ServiceError>;
    async fn fetch_emails(&self, token: &AccessToken) -> Result<Vec<ProviderEmail>, ServiceError>;
}

/// Scriptable provider for tests and doc examples
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    pub struct MockOAuthProvider {
        user: Mutex<ProviderUser>,
        emails: Mutex<Vec<ProviderEmail>>,
        reject_code: Mutex<bool>,
        exchanges: AtomicUsize,
    }

    impl MockOAuthProvider {
        /// Provider whose every code resolves to `login` with `email` as the
        /// verified primary address.
        pub fn with_identity(login: &str, email: &str) -> Self {
            Self {
                user: Mutex::new(ProviderUser { id: 1, login: login.to_string(), name: None }),
                emails: Mutex::new(vec![ProviderEmail { email: email.to_string(), primary: true, verified: true }]),
                reject_code: Mutex::new(false),
                exchanges: AtomicUsize::new(0),
            }
        }

        pub fn set_login(&self, login: &str) {
            self.user.lock().unwrap().login = login.to_string();
        }

        pub fn set_emails(&self, emails: Vec<ProviderEmail>) {
            *self.emails.lock().unwrap() = emails;
        }

        pub fn reject_codes(&self, reject: bool) {
            *self.reject_code.lock().unwrap() = reject;
        }

        pub fn exchanges(&self) -> usize {
            self.exchanges.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl OAuthProvider for MockOAuthProvider {
        fn authorization_url(&self, state: &str) -> String {
            format!("https://provider.test/authorize?state={state}")
        }

        async fn exchange_code(&self, code: &str) -> Result<AccessToken, ServiceError> {
            self.exchanges.fetch_add(1, Ordering::SeqCst);
            if *self.reject_code.lock().unwrap() || code.is_empty() {
                return Err(ServiceError::Remote("bad_verification_code".into()));
            }
            Ok(AccessToken::new(format!("tok-{code}")))
        }

        async fn fetch_user(&self, _token: &AccessToken) -> Result<ProviderUser, ServiceError> {
            Ok(self.user.lock().unwrap().clone())
        }

        async fn fetch_emails(&self, _token: &AccessToken) -> Result<Vec<ProviderEmail>, ServiceError> {
            Ok(self.emails.lock().unwrap().clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_token_debug_is_redacted() {
        let t = AccessToken::new("gho_secret");
        assert_eq!(format!("{t:?}"), "AccessToken([REDACTED])");
        assert_eq!(t.expose(), "gho_secret");
    }
}
