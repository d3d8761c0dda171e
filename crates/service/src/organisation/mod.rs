//! Organisation registry: generated names, transactional creation bound to
//! external workspace provisioning, and lookups.

pub mod domain;
pub mod provisioner;
pub mod repository;
pub mod service;

pub use service::OrganisationRegistry;
