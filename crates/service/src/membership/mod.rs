//! Idempotent `(user, organisation)` membership records.

pub mod domain;
pub mod repository;
pub mod service;

pub use service::MembershipLinker;
