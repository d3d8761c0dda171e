//! Federated sign-in core: tokens, accounts, organisations, memberships,
//! password sign-up, the GitHub OAuth reconciliation flow and organisation
//! invitations.
//! - Business logic is written against repository and collaborator traits.
//! - In-memory `mock` implementations live next to each trait.
//! - SeaORM repositories are under `repo` (feature `seaorm`).

pub mod errors;
pub mod token;
pub mod account;
pub mod organisation;
pub mod membership;
pub mod onboarding;
pub mod oauth;
pub mod invitation;
#[cfg(feature = "seaorm")]
pub mod repo;
#[cfg(all(test, feature = "seaorm"))]
pub mod test_support;

pub use errors::ServiceError;
