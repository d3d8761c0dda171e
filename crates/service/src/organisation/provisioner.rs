use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::domain::ProjectHandle;
use crate::errors::ServiceError;

/// External workspace (project space) provisioning.
#[async_trait]
pub trait WorkspaceProvisioner: Send + Sync {
    async fn create_project(&self, name: &str, description: &str) -> Result<ProjectHandle, ServiceError>;
}

#[derive(Debug, Clone)]
pub struct WorkspaceApiConfig {
    pub base_url: String,
    pub api_token: String,
    pub timeout: Duration,
}

#[derive(Serialize)]
struct CreateSpaceRequest<'a> {
    identifier: &'a str,
    description: &'a str,
    is_public: bool,
}

#[derive(Deserialize)]
struct CreateSpaceResponse {
    id: i64,
    identifier: String,
}

/// Workspace API client creating a private space per organisation.
pub struct HttpWorkspaceProvisioner {
    cfg: WorkspaceApiConfig,
    http: reqwest::Client,
}

impl HttpWorkspaceProvisioner {
    pub fn new(cfg: WorkspaceApiConfig) -> Result<Self, ServiceError> {
        let http = common::http::client_with_timeout(cfg.timeout)?;
        Ok(Self { cfg, http })
    }

    fn spaces_url(&self) -> String {
        format!("{}/api/v1/spaces", self.cfg.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl WorkspaceProvisioner for HttpWorkspaceProvisioner {
    #[instrument(skip(self, description), name = "HttpWorkspaceProvisioner::create_project")]
    async fn create_project(&self, name: &str, description: &str) -> Result<ProjectHandle, ServiceError> {
        let mut request = self
            .http
            .post(self.spaces_url())
            .json(&CreateSpaceRequest { identifier: name, description, is_public: false });
        if !self.cfg.api_token.is_empty() {
            request = request.bearer_auth(&self.cfg.api_token);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Remote(format!("workspace API returned {status}: {body}")));
        }
        let created: CreateSpaceResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Remote(format!("failed to parse workspace response: {e}")))?;
        debug!(space_id = created.id, identifier = %created.identifier, "workspace space created");
        Ok(ProjectHandle { id: created.id, identifier: created.identifier })
    }
}

/// Scriptable provisioner for tests and doc examples
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct StubProvisioner {
        fail: AtomicBool,
        next_id: AtomicI64,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl StubProvisioner {
        pub fn failing() -> Self {
            let stub = Self::default();
            stub.set_failing(true);
            stub
        }

        pub fn set_failing(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        /// `(name, description)` of every call, successful or not.
        pub fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WorkspaceProvisioner for StubProvisioner {
        async fn create_project(&self, name: &str, description: &str) -> Result<ProjectHandle, ServiceError> {
            self.calls.lock().unwrap().push((name.to_string(), description.to_string()));
            if self.fail.load(Ordering::SeqCst) {
                return Err(ServiceError::Remote("workspace API unavailable".into()));
            }
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(ProjectHandle { id, identifier: name.to_string() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provisioner(server: &MockServer, api_token: &str) -> HttpWorkspaceProvisioner {
        HttpWorkspaceProvisioner::new(WorkspaceApiConfig {
            base_url: format!("{}/", server.uri()),
            api_token: api_token.into(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn creates_private_space() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/spaces"))
            .and(header("authorization", "Bearer ws-token"))
            .and(body_json(json!({ "identifier": "acme-7", "description": "Workspace for Acme", "is_public": false })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 31, "identifier": "acme-7" })))
            .expect(1)
            .mount(&server)
            .await;

        let handle = provisioner(&server, "ws-token").create_project("acme-7", "Workspace for Acme").await.unwrap();
        assert_eq!(handle, ProjectHandle { id: 31, identifier: "acme-7".into() });
    }

    #[tokio::test]
    async fn server_error_is_remote_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/spaces"))
            .respond_with(ResponseTemplate::new(500).set_body_string("database is down"))
            .mount(&server)
            .await;

        let err = provisioner(&server, "").create_project("acme-7", "d").await.unwrap_err();
        assert!(matches!(err, ServiceError::Remote(ref m) if m.contains("500") && m.contains("database is down")));
    }

    #[tokio::test]
    async fn unparseable_success_body_is_remote_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/spaces"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        assert!(matches!(provisioner(&server, "").create_project("x", "d").await, Err(ServiceError::Remote(_))));
    }
}
