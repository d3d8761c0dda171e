//! Storage-backed repository implementations.

pub mod seaorm;

pub use seaorm::{SeaOrmMembershipRepository, SeaOrmOrganisationRepository, SeaOrmUserRepository};
