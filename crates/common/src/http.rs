//! Shared outbound HTTP client construction.
//!
//! Every call the services make to a third party goes through a client built
//! here, so each one carries the same User-Agent and an explicit timeout.

use std::time::Duration;

use reqwest::{Client, ClientBuilder};

use crate::CoreError;

pub const USER_AGENT: &str = concat!("orgfed/", env!("CARGO_PKG_VERSION"));

/// Client builder with the standard User-Agent.
pub fn builder() -> ClientBuilder {
    Client::builder().user_agent(USER_AGENT)
}

/// Build a client that aborts any request running longer than `timeout`.
pub fn client_with_timeout(timeout: Duration) -> Result<Client, CoreError> {
    builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
        .map_err(|e| CoreError::Network(e.to_string()))
}
