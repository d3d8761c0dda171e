use thiserror::Error;

use models::errors::ModelError;

/// Failure taxonomy shared by every service in this crate.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    /// The caller is authenticated but may not act on the target.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// A token carried the right shape but was malformed, expired or forged.
    #[error("token decode failed: {0}")]
    Decode(String),
    /// A third-party call (OAuth provider, workspace API, email API) failed.
    #[error("remote call failed: {0}")]
    Remote(String),
    #[error("token error: {0}")]
    Token(String),
    #[error("hashing error: {0}")]
    Hash(String),
    #[error("repository error: {0}")]
    Repository(String),
}

impl ServiceError {
    pub fn not_found(entity: &str) -> Self { Self::NotFound(format!("{} not found", entity)) }

    pub fn is_not_found(&self) -> bool { matches!(self, ServiceError::NotFound(_)) }

    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self {
            ServiceError::Validation(_) => 1001,
            ServiceError::Conflict(_) => 1002,
            ServiceError::NotFound(_) => 1003,
            ServiceError::Decode(_) => 1004,
            ServiceError::Forbidden(_) => 1005,
            ServiceError::Hash(_) => 1101,
            ServiceError::Token(_) => 1102,
            ServiceError::Remote(_) => 1150,
            ServiceError::Repository(_) => 1200,
        }
    }
}

impl From<ModelError> for ServiceError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::Validation(msg) => ServiceError::Validation(msg),
            ModelError::Duplicate(msg) => ServiceError::Conflict(msg),
            ModelError::Db(msg) => ServiceError::Repository(msg),
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ServiceError::Remote(format!("timed out: {e}"))
        } else {
            ServiceError::Remote(e.to_string())
        }
    }
}

impl From<common::CoreError> for ServiceError {
    fn from(e: common::CoreError) -> Self { ServiceError::Remote(e.to_string()) }
}
