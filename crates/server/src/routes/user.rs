use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use service::onboarding::PasswordSession;
use tracing::info;

use super::session::session_cookie;
use crate::errors::ApiError;
use crate::state::ServerState;

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub invite_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Register with email and password; 201 with the session in body and cookie.
pub async fn sign_up(
    State(state): State<ServerState>,
    jar: CookieJar,
    Json(input): Json<SignUpRequest>,
) -> Result<(StatusCode, CookieJar, Json<PasswordSession>), ApiError> {
    let session = state
        .onboarding
        .sign_up(&input.email, &input.password, input.invite_token.as_deref())
        .await?;
    info!(user_id = session.user_id, organisation_id = session.organisation_id, "sign-up complete");
    let jar = jar.add(session_cookie(&state, session.session_token.clone()));
    Ok((StatusCode::CREATED, jar, Json(session)))
}

pub async fn sign_in(
    State(state): State<ServerState>,
    jar: CookieJar,
    Json(input): Json<SignInRequest>,
) -> Result<(CookieJar, Json<PasswordSession>), ApiError> {
    let session = state.onboarding.sign_in(&input.email, &input.password).await?;
    let jar = jar.add(session_cookie(&state, session.session_token.clone()));
    Ok((jar, Json(session)))
}
