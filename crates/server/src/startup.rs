use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::Router;
use configs::AppConfig;
use migration::MigratorTrait;
use sea_orm::DatabaseConnection;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use service::{
    account::AccountDirectory,
    invitation::{
        email::{EmailSenderConfig, HttpEmailSender},
        template::InviteTemplate,
        InvitationConfig, InvitationDispatcher,
    },
    membership::MembershipLinker,
    oauth::{
        github::{GitHubOAuthClient, GitHubOAuthConfig},
        FederationFlow,
    },
    onboarding::Onboarding,
    organisation::{
        provisioner::{HttpWorkspaceProvisioner, WorkspaceApiConfig},
        OrganisationRegistry,
    },
    repo::{SeaOrmMembershipRepository, SeaOrmOrganisationRepository, SeaOrmUserRepository},
    token::{TokenCodec, TokenConfig},
};

use crate::errors::StartupError;
use crate::routes;
use crate::state::ServerState;

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

/// Wire storage, collaborators and services from configuration.
pub fn build_state(cfg: &AppConfig, db: DatabaseConnection) -> Result<ServerState, StartupError> {
    if let Err(e) = reqwest::Url::parse(&cfg.app.url) {
        return Err(StartupError::InvalidConfig(format!("app.url {:?}: {e}", cfg.app.url)));
    }
    let tokens = Arc::new(TokenCodec::new(TokenConfig {
        secret: cfg.tokens.jwt_secret.clone(),
        invite_ttl: chrono::Duration::hours(cfg.tokens.invite_ttl_hours),
        session_ttl: chrono::Duration::hours(cfg.tokens.session_ttl_hours),
    })?);

    let accounts = Arc::new(AccountDirectory::new(Arc::new(SeaOrmUserRepository { db: db.clone() })));
    let provisioner = HttpWorkspaceProvisioner::new(WorkspaceApiConfig {
        base_url: cfg.workspace.base_url.clone(),
        api_token: cfg.workspace.api_token.clone(),
        timeout: Duration::from_secs(cfg.workspace.http_timeout_secs),
    })?;
    let organisations = Arc::new(OrganisationRegistry::new(
        Arc::new(SeaOrmOrganisationRepository { db: db.clone() }),
        Arc::new(provisioner),
    ));
    let memberships = Arc::new(MembershipLinker::new(Arc::new(SeaOrmMembershipRepository { db })));

    let onboarding = Arc::new(Onboarding::new(Arc::clone(&tokens), Arc::clone(&accounts), organisations, memberships));

    let github = GitHubOAuthClient::new(GitHubOAuthConfig {
        client_id: cfg.github.client_id.clone(),
        client_secret: cfg.github.client_secret.clone(),
        redirect_uri: cfg.github.redirect_url.clone(),
        scopes: cfg.github.scopes.clone(),
        timeout: Duration::from_secs(cfg.github.http_timeout_secs),
        oauth_base_url: cfg.github.oauth_base_url.clone(),
        api_base_url: cfg.github.api_base_url.clone(),
    })?;
    let flow = Arc::new(FederationFlow::new(Arc::new(github), Arc::clone(&onboarding)));

    if cfg.email.api_key.is_empty() {
        warn!("email.api_key is empty; invitations will report failure");
    }
    let sender = HttpEmailSender::new(EmailSenderConfig {
        api_url: cfg.email.api_url.clone(),
        api_key: cfg.email.api_key.clone(),
        from_email: cfg.email.from_email.clone(),
        from_name: cfg.email.from_name.clone(),
        timeout: Duration::from_secs(cfg.email.http_timeout_secs),
    })?;
    let mut invitation_cfg = InvitationConfig::new(cfg.app.url.clone());
    if let Some(path) = cfg.email.invite_template_path.as_deref() {
        invitation_cfg = invitation_cfg.with_template(InviteTemplate::from_file(path)?);
        info!(path, "loaded invite email template");
    }
    let invitations = Arc::new(InvitationDispatcher::new(
        Arc::clone(&accounts),
        Arc::clone(&tokens),
        Arc::new(sender),
        invitation_cfg,
    ));

    Ok(ServerState { flow, onboarding, invitations, accounts, tokens, app_url: cfg.app.url.clone() })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(err = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

/// Public entry: connect, migrate if asked, build the app and serve until Ctrl+C.
pub async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    let db = models::db::connect_with_config(&cfg.database).await?;
    if cfg.database.auto_migrate {
        migration::Migrator::up(&db, None).await?;
        info!("database migrations applied");
    }

    let state = build_state(&cfg, db)?;
    let app: Router = routes::build_router(state, build_cors());

    let addr: SocketAddr = format!("{}:{}", cfg.server.host, cfg.server.port).parse()?;
    info!(%addr, "starting server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}
