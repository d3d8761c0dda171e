use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::email::{EmailSender, SendEmailRequest, SendResult};
use super::template::InviteTemplate;
use crate::account::AccountDirectory;
use crate::errors::ServiceError;
use crate::token::TokenCodec;

pub const DEFAULT_INVITE_SUBJECT: &str = "SuperCoder Invite";

#[derive(Debug, Clone)]
pub struct InvitationConfig {
    /// Public app URL without trailing slash; invite links point back here.
    pub app_url: String,
    pub subject: String,
    pub template: InviteTemplate,
}

impl InvitationConfig {
    pub fn new(app_url: impl Into<String>) -> Self {
        Self {
            app_url: app_url.into().trim_end_matches('/').to_string(),
            subject: DEFAULT_INVITE_SUBJECT.to_string(),
            template: InviteTemplate::default(),
        }
    }

    pub fn with_template(self, template: InviteTemplate) -> Self {
        Self { template, ..self }
    }

    pub fn invite_url(&self, invite_token: &str) -> String {
        format!("{}/api/organisation/handle_invite?invite_token={}", self.app_url, invite_token)
    }
}

/// Sends organisation invitations.
///
/// Never raises: every failure, from an unknown inviter to a rejected email,
/// comes back as an unsuccessful [`SendResult`].
pub struct InvitationDispatcher {
    accounts: Arc<AccountDirectory>,
    tokens: Arc<TokenCodec>,
    sender: Arc<dyn EmailSender>,
    config: InvitationConfig,
}

impl InvitationDispatcher {
    pub fn new(
        accounts: Arc<AccountDirectory>,
        tokens: Arc<TokenCodec>,
        sender: Arc<dyn EmailSender>,
        config: InvitationConfig,
    ) -> Self {
        Self { accounts, tokens, sender, config }
    }

    #[instrument(skip(self, email))]
    pub async fn invite(&self, organisation_id: i64, email: &str, inviting_user_id: i64) -> SendResult {
        let request = match self.build_request(organisation_id, email, inviting_user_id).await {
            Ok(request) => request,
            Err(e) => {
                warn!(err = %e, "invitation not sent");
                return SendResult::failed(e.to_string());
            }
        };
        let result = self.sender.send_outbound_email(request).await;
        if result.success {
            info!(organisation_id, inviting_user_id, "invitation_sent");
        } else {
            warn!(organisation_id, error = ?result.error, "invitation delivery failed");
        }
        result
    }

    async fn build_request(&self, organisation_id: i64, email: &str, inviting_user_id: i64) -> Result<SendEmailRequest, ServiceError> {
        let email = email.trim();
        if !email.contains('@') {
            return Err(ServiceError::Validation("invalid invitee email".into()));
        }
        let inviter = self.accounts.get_by_id(inviting_user_id).await?;
        let token = self.tokens.encode_invite(organisation_id, email)?;
        let url = self.config.invite_url(&token);
        let html_content = self.config.template.render(&inviter.email, &url)?;
        Ok(SendEmailRequest {
            to_email: email.to_string(),
            content: url,
            html_content,
            subject: self.config.subject.clone(),
        })
    }
}
