//! Account directory: user lookup, creation and overwrite, plus the password
//! helpers used for accounts created through federation.

pub mod domain;
pub mod password;
pub mod repository;
pub mod service;

pub use service::AccountDirectory;
