//! OAuth federation: the provider seam, the GitHub adapter and the
//! callback flow that reconciles a federated identity with local accounts,
//! organisations and memberships.

pub mod flow;
pub mod github;
pub mod provider;

pub use flow::{FederationFlow, FederationOutcome};
pub use provider::OAuthProvider;
