use std::path::Path;

use crate::errors::ServiceError;

const INVITOR_PLACEHOLDER: &str = "{{InvitorEmail}}";
const URL_PLACEHOLDER: &str = "{{InviteURL}}";

pub const DEFAULT_INVITE_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>You're invited</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h1 style="color: #2c3e50;">You've been invited</h1>
    <p>{{InvitorEmail}} has invited you to join their organisation.</p>
    <p style="margin: 30px 0;">
        <a href="{{InviteURL}}" style="background-color: #3498db; color: #fff; padding: 12px 24px; text-decoration: none; border-radius: 4px;">Accept invitation</a>
    </p>
    <p>If the button does not work, copy this link into your browser:</p>
    <p style="word-break: break-all;">{{InviteURL}}</p>
</body>
</html>
"#;

/// Invite email body with `{{InvitorEmail}}` and `{{InviteURL}}` slots.
#[derive(Debug, Clone)]
pub struct InviteTemplate {
    html: String,
}

impl Default for InviteTemplate {
    fn default() -> Self {
        Self { html: DEFAULT_INVITE_HTML.to_string() }
    }
}

impl InviteTemplate {
    pub fn new(html: impl Into<String>) -> Result<Self, ServiceError> {
        let html = html.into();
        if !html.contains(URL_PLACEHOLDER) {
            return Err(ServiceError::Validation(format!("invite template lacks {URL_PLACEHOLDER}")));
        }
        Ok(Self { html })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ServiceError> {
        let path = path.as_ref();
        let html = std::fs::read_to_string(path)
            .map_err(|e| ServiceError::Validation(format!("invite template {}: {e}", path.display())))?;
        Self::new(html)
    }

    /// Fill both slots with HTML-escaped values. Any other `{{...}}` in the
    /// template is an error; braces inside the values are copied as-is.
    pub fn render(&self, invitor_email: &str, invite_url: &str) -> Result<String, ServiceError> {
        if let Some(tail) = unknown_placeholder(&self.html) {
            return Err(ServiceError::Validation(format!("unknown template placeholder near {tail}")));
        }
        Ok(self
            .html
            .replace(INVITOR_PLACEHOLDER, &escape_html(invitor_email))
            .replace(URL_PLACEHOLDER, &escape_html(invite_url)))
    }
}

/// First `{{` in `html` that does not open a known slot.
fn unknown_placeholder(html: &str) -> Option<String> {
    let mut rest = html;
    while let Some(pos) = rest.find("{{") {
        let candidate = &rest[pos..];
        if let Some(slot) = [INVITOR_PLACEHOLDER, URL_PLACEHOLDER].into_iter().find(|p| candidate.starts_with(*p)) {
            rest = &candidate[slot.len()..];
        } else {
            return Some(candidate.chars().take(32).collect());
        }
    }
    None
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
