//! Organisation invitations: signed invite link plus outbound email.

pub mod email;
pub mod service;
pub mod template;

pub use service::{InvitationConfig, InvitationDispatcher};
