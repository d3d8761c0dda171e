//! Signed invite and session tokens.
//!
//! Both are HS256 JWTs signed with the same secret. They are told apart by
//! their `aud` claim (`invite` / `session`), which is enforced on decode, so
//! one can never be accepted in place of the other.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::ServiceError;

/// Reserved prefix marking an OAuth `state` value that carries an invite token.
pub const INVITE_STATE_PREFIX: &str = "token:";

const INVITE_AUDIENCE: &str = "invite";
const SESSION_AUDIENCE: &str = "session";

#[derive(Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub invite_ttl: Duration,
    pub session_ttl: Duration,
}

impl TokenConfig {
    /// Invite links stay valid for a week, sessions for 12 hours.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self { secret: secret.into(), invite_ttl: Duration::hours(24 * 7), session_ttl: Duration::hours(12) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InviteClaims {
    /// Invited email address
    pub sub: String,
    /// Target organisation id
    pub org: i64,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl InviteClaims {
    pub fn email(&self) -> &str { &self.sub }
    pub fn organisation_id(&self) -> i64 { self.org }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub uid: i64,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn email(&self) -> &str { &self.sub }
    pub fn user_id(&self) -> i64 { self.uid }
}

pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    invite_ttl: Duration,
    session_ttl: Duration,
}

impl TokenCodec {
    pub fn new(cfg: TokenConfig) -> Result<Self, ServiceError> {
        if cfg.secret.is_empty() {
            return Err(ServiceError::Validation("token secret must not be empty".into()));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            invite_ttl: cfg.invite_ttl,
            session_ttl: cfg.session_ttl,
        })
    }

    pub fn encode_invite(&self, organisation_id: i64, email: &str) -> Result<String, ServiceError> {
        self.encode_invite_at(organisation_id, email, Utc::now())
    }

    pub(crate) fn encode_invite_at(&self, organisation_id: i64, email: &str, issued_at: DateTime<Utc>) -> Result<String, ServiceError> {
        if organisation_id <= 0 {
            return Err(ServiceError::Validation("invite needs a positive organisation id".into()));
        }
        let claims = InviteClaims {
            sub: email.to_string(),
            org: organisation_id,
            aud: INVITE_AUDIENCE.into(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.invite_ttl).timestamp(),
        };
        self.sign(&claims)
    }

    pub fn decode_invite(&self, token: &str) -> Result<InviteClaims, ServiceError> {
        self.verify::<InviteClaims>(token, INVITE_AUDIENCE)
    }

    /// Interpret an OAuth `state` value.
    ///
    /// `Ok(None)` when the value is not an invite at all (plain anti-forgery
    /// nonce); `Err(Decode)` when it carries the invite prefix but the token
    /// does not verify.
    pub fn decode_invite_state(&self, state: &str) -> Result<Option<InviteClaims>, ServiceError> {
        match state.strip_prefix(INVITE_STATE_PREFIX) {
            Some(token) => self.decode_invite(token).map(Some),
            None => Ok(None),
        }
    }

    /// Build the `state` value that carries `invite_token` through the provider.
    pub fn invite_state(invite_token: &str) -> String {
        format!("{INVITE_STATE_PREFIX}{invite_token}")
    }

    pub fn encode_session(&self, user_id: i64, email: &str) -> Result<String, ServiceError> {
        self.encode_session_at(user_id, email, Utc::now())
    }

    pub(crate) fn encode_session_at(&self, user_id: i64, email: &str, issued_at: DateTime<Utc>) -> Result<String, ServiceError> {
        let claims = SessionClaims {
            sub: email.to_string(),
            uid: user_id,
            aud: SESSION_AUDIENCE.into(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.session_ttl).timestamp(),
        };
        self.sign(&claims)
    }

    pub fn decode_session(&self, token: &str) -> Result<SessionClaims, ServiceError> {
        self.verify::<SessionClaims>(token, SESSION_AUDIENCE)
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, ServiceError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| ServiceError::Token(e.to_string()))
    }

    fn verify<T: for<'de> Deserialize<'de>>(&self, token: &str, audience: &str) -> Result<T, ServiceError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_audience(&[audience]);
        validation.set_required_spec_claims(&["exp", "aud", "sub"]);
        decode::<T>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(audience, err = %e, "token rejected");
                ServiceError::Decode(e.to_string())
            })
    }
}
