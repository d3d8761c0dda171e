use anyhow::Result;
use serde::Deserialize;
use anyhow::anyhow;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub app: PublicAppConfig,
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub tokens: TokenSettings,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
    /// `compact` or `json`
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8080, worker_threads: Some(4), log_format: default_log_format() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime_secs: u64,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
    #[serde(default)]
    pub sqlx_logging: bool,
    /// Apply pending migrations at startup.
    #[serde(default)]
    pub auto_migrate: bool,
}

/// Public URL of the frontend; redirects and invite links are built from it.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PublicAppConfig {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub redirect_url: String,
    #[serde(default = "default_github_scopes")]
    pub scopes: Vec<String>,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
    /// Host of the authorize and token endpoints.
    #[serde(default = "default_github_oauth_base_url")]
    pub oauth_base_url: String,
    #[serde(default = "default_github_api_base_url")]
    pub api_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenSettings {
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default = "default_invite_ttl")]
    pub invite_ttl_hours: i64,
    #[serde(default = "default_session_ttl")]
    pub session_ttl_hours: i64,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self { jwt_secret: String::new(), invite_ttl_hours: default_invite_ttl(), session_ttl_hours: default_session_ttl() }
    }
}

/// External workspace (project space) provisioning API.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_token: String,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "default_email_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub from_email: String,
    #[serde(default)]
    pub from_name: String,
    #[serde(default)]
    pub invite_template_path: Option<String>,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            max_lifetime_secs: default_max_lifetime(),
            acquire_timeout_secs: default_acquire_timeout(),
            sqlx_logging: false,
            auto_migrate: false,
        }
    }
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_url: String::new(),
            scopes: default_github_scopes(),
            http_timeout_secs: default_http_timeout(),
            oauth_base_url: default_github_oauth_base_url(),
            api_base_url: default_github_api_base_url(),
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self { base_url: String::new(), api_token: String::new(), http_timeout_secs: default_http_timeout() }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_url: default_email_api_url(),
            api_key: String::new(),
            from_email: String::new(),
            from_name: String::new(),
            invite_template_path: None,
            http_timeout_secs: default_http_timeout(),
        }
    }
}

fn default_log_format() -> String { "compact".into() }
fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 30 }
fn default_idle_timeout() -> u64 { 600 }
fn default_max_lifetime() -> u64 { 3600 }
fn default_acquire_timeout() -> u64 { 30 }
fn default_github_scopes() -> Vec<String> { vec!["user:email".into()] }
fn default_github_oauth_base_url() -> String { "https://github.com".into() }
fn default_github_api_base_url() -> String { "https://api.github.com".into() }
fn default_http_timeout() -> u64 { 10 }
fn default_invite_ttl() -> i64 { 24 * 7 }
fn default_session_ttl() -> i64 { 12 }
fn default_email_api_url() -> String { "https://api.sendgrid.com/v3/mail/send".into() }

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let cfg: AppConfig = toml::from_str(&content)?;
    Ok(cfg)
}

/// Like [`load_from_file`], but a missing file yields the defaults.
/// Any other read error and every parse error is returned.
pub fn load_or_default(path: &str) -> Result<AppConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(AppConfig::default()),
        Err(e) => return Err(anyhow!("failed to read {path}: {e}")),
    };
    toml::from_str(&content).map_err(|e| anyhow!("failed to parse {path}: {e}"))
}

/// Overwrite `slot` with the env var `key` when the file left it empty.
fn fill_from_env(slot: &mut String, key: &str) {
    if slot.trim().is_empty() {
        if let Ok(v) = std::env::var(key) {
            *slot = v;
        }
    }
}

impl AppConfig {
    /// Load `config.toml` (or `CONFIG_PATH`); a missing file falls back to
    /// defaults plus environment variables.
    pub fn load_and_validate() -> Result<Self> {
        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        let mut cfg = load_or_default(&path)?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize()?;
        self.database.normalize_from_env();
        self.database.validate()?;
        fill_from_env(&mut self.app.url, "APP_URL");
        if self.app.url.trim().is_empty() {
            return Err(anyhow!("app.url is empty; set it in config.toml or APP_URL"));
        }
        self.app.url = self.app.url.trim_end_matches('/').to_string();
        self.github.normalize_from_env();
        self.github.validate()?;
        self.tokens.normalize_from_env();
        self.tokens.validate()?;
        self.workspace.normalize_from_env();
        self.workspace.validate()?;
        self.email.normalize_from_env();
        Ok(())
    }
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be in 1..=65535"));
        }
        match self.worker_threads {
            Some(0) | None => self.worker_threads = Some(4),
            Some(_) => {}
        }
        Ok(())
    }
}

impl DatabaseConfig {
    pub fn normalize_from_env(&mut self) {
        fill_from_env(&mut self.url, "DATABASE_URL");
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(anyhow!("database.url is empty; set it in config.toml or DATABASE_URL"));
        }
        let lower = self.url.to_lowercase();
        if !(lower.starts_with("postgresql://") || lower.starts_with("postgres://")) {
            return Err(anyhow!("database.url must start with postgresql:// or postgres://"));
        }
        if self.min_connections == 0 {
            return Err(anyhow!("database.min_connections must be >= 1"));
        }
        if self.max_connections < self.min_connections {
            return Err(anyhow!("database.max_connections must be >= min_connections"));
        }
        if self.connect_timeout_secs == 0 || self.acquire_timeout_secs == 0 {
            return Err(anyhow!("database timeouts must be positive seconds"));
        }
        Ok(())
    }
}

impl GithubConfig {
    pub fn normalize_from_env(&mut self) {
        fill_from_env(&mut self.client_id, "GITHUB_CLIENT_ID");
        fill_from_env(&mut self.client_secret, "GITHUB_CLIENT_SECRET");
        fill_from_env(&mut self.redirect_url, "GITHUB_REDIRECT_URL");
        if self.scopes.is_empty() {
            self.scopes = default_github_scopes();
        }
        self.oauth_base_url = self.oauth_base_url.trim_end_matches('/').to_string();
        self.api_base_url = self.api_base_url.trim_end_matches('/').to_string();
    }

    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() || self.client_secret.trim().is_empty() {
            return Err(anyhow!("github.client_id and github.client_secret are required"));
        }
        if self.redirect_url.trim().is_empty() {
            return Err(anyhow!("github.redirect_url is required"));
        }
        if self.http_timeout_secs == 0 {
            return Err(anyhow!("github.http_timeout_secs must be positive"));
        }
        Ok(())
    }
}

impl TokenSettings {
    pub fn normalize_from_env(&mut self) {
        fill_from_env(&mut self.jwt_secret, "JWT_SECRET");
    }

    pub fn validate(&self) -> Result<()> {
        if self.jwt_secret.len() < 16 {
            return Err(anyhow!("tokens.jwt_secret must be at least 16 bytes"));
        }
        if self.invite_ttl_hours <= 0 || self.session_ttl_hours <= 0 {
            return Err(anyhow!("token TTLs must be positive hours"));
        }
        Ok(())
    }
}

impl WorkspaceConfig {
    pub fn normalize_from_env(&mut self) {
        fill_from_env(&mut self.base_url, "WORKSPACE_BASE_URL");
        fill_from_env(&mut self.api_token, "WORKSPACE_API_TOKEN");
        self.base_url = self.base_url.trim_end_matches('/').to_string();
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(anyhow!("workspace.base_url is required"));
        }
        if self.http_timeout_secs == 0 {
            return Err(anyhow!("workspace.http_timeout_secs must be positive"));
        }
        Ok(())
    }
}

impl EmailConfig {
    pub fn normalize_from_env(&mut self) {
        fill_from_env(&mut self.api_key, "EMAIL_API_KEY");
        fill_from_env(&mut self.from_email, "EMAIL_FROM");
        if self.http_timeout_secs == 0 {
            self.http_timeout_secs = default_http_timeout();
        }
        if self.api_url.trim().is_empty() {
            self.api_url = default_email_api_url();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[server]
host = "0.0.0.0"
port = 9000

[database]
url = "postgres://u:p@localhost:5432/orgfed"

[app]
url = "https://app.example.com/"

[github]
client_id = "cid"
client_secret = "csecret"
redirect_url = "https://api.example.com/api/github/callback"

[tokens]
jwt_secret = "0123456789abcdef0123"

[workspace]
base_url = "https://workspace.example.com/"
"#;

    #[test]
    fn parses_and_normalizes_sample() {
        let mut cfg: AppConfig = toml::from_str(SAMPLE).unwrap();
        cfg.normalize_and_validate().unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.server.worker_threads, Some(4));
        assert_eq!(cfg.app.url, "https://app.example.com");
        assert_eq!(cfg.workspace.base_url, "https://workspace.example.com");
        assert_eq!(cfg.github.scopes, vec!["user:email".to_string()]);
        assert_eq!(cfg.github.oauth_base_url, "https://github.com");
        assert_eq!(cfg.github.api_base_url, "https://api.github.com");
        assert_eq!(cfg.tokens.invite_ttl_hours, 168);
        assert_eq!(cfg.tokens.session_ttl_hours, 12);
        assert_eq!(cfg.email.api_url, "https://api.sendgrid.com/v3/mail/send");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join(format!("orgfed-missing-{}.toml", std::process::id()));
        let cfg = load_or_default(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.server.port, 8080);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("orgfed-malformed-{}.toml", std::process::id()));
        std::fs::write(&path, "[server]\nport = \"not-a-number\"\n").unwrap();
        let res = load_or_default(path.to_str().unwrap());
        std::fs::remove_file(&path).ok();
        let err = res.unwrap_err().to_string();
        assert!(err.contains("failed to parse"), "{err}");
    }

    #[test]
    fn rejects_short_jwt_secret() {
        let t = TokenSettings { jwt_secret: "short".into(), ..TokenSettings::default() };
        assert!(t.validate().is_err());
    }

    #[test]
    fn rejects_non_postgres_url() {
        let db = DatabaseConfig { url: "mysql://x".into(), ..Default::default() };
        assert!(db.validate().is_err());
    }
}
