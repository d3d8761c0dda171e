pub mod errors;
pub mod db;
pub mod organisation;
pub mod user;
pub mod organisation_user;
