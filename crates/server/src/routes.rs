use axum::{
    middleware,
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use reqwest::Url;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use common::types::Health;

use crate::state::ServerState;

pub mod github;
pub mod organisation;
pub mod session;
pub mod user;

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

/// 307 to the frontend with `params` appended as an encoded query string.
pub(crate) fn app_redirect(app_url: &str, params: &[(&str, &str)]) -> Redirect {
    match Url::parse_with_params(app_url, params) {
        Ok(url) => Redirect::temporary(url.as_str()),
        Err(e) => {
            tracing::error!(app_url, err = %e, "app url does not parse; redirecting without parameters");
            Redirect::temporary(app_url)
        }
    }
}

/// Build the application router: public sign-in, sign-up and invite-link
/// routes plus the session-protected organisation endpoints.
pub fn build_router(state: ServerState, cors: CorsLayer) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/api/github/signin", get(github::signin))
        .route("/api/github/callback", get(github::callback))
        .route("/api/organisation/handle_invite", get(organisation::handle_invite))
        .route("/api/user/sign_up", post(user::sign_up))
        .route("/api/user/sign_in", post(user::sign_in));

    let protected = Router::new()
        .route("/api/organisation/invite", post(organisation::invite))
        .route("/api/organisation/remove_user", post(organisation::remove_user))
        .route_layer(middleware::from_fn_with_state(state.clone(), session::require_session));

    public
        .merge(protected)
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}
