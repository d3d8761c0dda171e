use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument, warn};

use crate::errors::ServiceError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendEmailRequest {
    pub to_email: String,
    /// Plain-text body
    pub content: String,
    pub html_content: String,
    pub subject: String,
}

/// Outcome of an email send, reported rather than raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendResult {
    pub fn sent(message_id: Option<String>) -> Self {
        Self { success: true, message_id, error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { success: false, message_id: None, error: Some(error.into()) }
    }
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_outbound_email(&self, request: SendEmailRequest) -> SendResult;
}

#[derive(Debug, Clone)]
pub struct EmailSenderConfig {
    pub api_url: String,
    pub api_key: String,
    pub from_email: String,
    pub from_name: String,
    pub timeout: Duration,
}

/// Transactional mail over the SendGrid v3 `mail/send` JSON API.
pub struct HttpEmailSender {
    cfg: EmailSenderConfig,
    http: reqwest::Client,
}

impl HttpEmailSender {
    pub fn new(cfg: EmailSenderConfig) -> Result<Self, ServiceError> {
        let http = common::http::client_with_timeout(cfg.timeout)?;
        Ok(Self { cfg, http })
    }

    fn payload(&self, request: &SendEmailRequest) -> serde_json::Value {
        json!({
            "personalizations": [{ "to": [{ "email": request.to_email }] }],
            "from": { "email": self.cfg.from_email, "name": self.cfg.from_name },
            "subject": request.subject,
            "content": [
                { "type": "text/plain", "value": request.content },
                { "type": "text/html", "value": request.html_content },
            ],
        })
    }

    async fn deliver(&self, request: &SendEmailRequest) -> Result<Option<String>, ServiceError> {
        if self.cfg.api_key.is_empty() {
            return Err(ServiceError::Validation("email API key is not configured".into()));
        }
        let response = self
            .http
            .post(&self.cfg.api_url)
            .bearer_auth(&self.cfg.api_key)
            .json(&self.payload(request))
            .send()
            .await?;
        let status = response.status();
        let message_id = response
            .headers()
            .get("X-Message-Id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Remote(format!("email API returned {status}: {body}")));
        }
        Ok(message_id)
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    #[instrument(skip_all, fields(to = %request.to_email), name = "HttpEmailSender::send_outbound_email")]
    async fn send_outbound_email(&self, request: SendEmailRequest) -> SendResult {
        match self.deliver(&request).await {
            Ok(message_id) => {
                debug!(?message_id, "email accepted");
                SendResult::sent(message_id)
            }
            Err(e) => {
                warn!(err = %e, "email send failed");
                SendResult::failed(e.to_string())
            }
        }
    }
}

/// Recording sender for tests and doc examples
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct RecordingEmailSender {
        sent: Mutex<Vec<SendEmailRequest>>,
        fail_with: Mutex<Option<String>>,
    }

    impl RecordingEmailSender {
        pub fn failing(error: &str) -> Self {
            let s = Self::default();
            *s.fail_with.lock().unwrap() = Some(error.to_string());
            s
        }

        pub fn sent(&self) -> Vec<SendEmailRequest> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EmailSender for RecordingEmailSender {
        async fn send_outbound_email(&self, request: SendEmailRequest) -> SendResult {
            if let Some(err) = self.fail_with.lock().unwrap().clone() {
                return SendResult::failed(err);
            }
            let mut sent = self.sent.lock().unwrap();
            sent.push(request);
            SendResult::sent(Some(format!("msg-{}", sent.len())))
        }
    }
}
