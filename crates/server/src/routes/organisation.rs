use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Redirect,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;
use service::invitation::email::SendResult;
use service::token::SessionClaims;
use tracing::warn;

use super::app_redirect;
use crate::errors::ApiError;
use crate::state::ServerState;

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct RemoveUserRequest {
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct HandleInviteQuery {
    pub invite_token: Option<String>,
}

/// Invite `email` into the caller's organisation.
pub async fn invite(
    State(state): State<ServerState>,
    Extension(session): Extension<SessionClaims>,
    Json(input): Json<InviteRequest>,
) -> Result<(StatusCode, Json<SendResult>), ApiError> {
    let organisation_id = match state.accounts.organisation_id_of(session.user_id()).await? {
        Some(id) => id,
        None => {
            return Ok((StatusCode::BAD_REQUEST, Json(SendResult::failed("inviting user has no organisation"))));
        }
    };
    let result = state.invitations.invite(organisation_id, &input.email, session.user_id()).await;
    let status = if result.success { StatusCode::OK } else { StatusCode::BAD_REQUEST };
    Ok((status, Json(result)))
}

/// Move a member of the caller's organisation into a new organisation of
/// their own.
pub async fn remove_user(
    State(state): State<ServerState>,
    Extension(session): Extension<SessionClaims>,
    Json(input): Json<RemoveUserRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let org = state.onboarding.remove_from_organisation(session.user_id(), input.user_id).await?;
    Ok(Json(json!({ "success": true, "organisation_id": org.id })))
}

/// Invite link target: hand a valid token to the frontend, which starts the
/// sign-in with it.
pub async fn handle_invite(State(state): State<ServerState>, Query(q): Query<HandleInviteQuery>) -> Redirect {
    let token = q.invite_token.unwrap_or_default();
    match state.tokens.decode_invite(&token) {
        Ok(claims) => app_redirect(&state.app_url, &[("user_email", claims.email()), ("invite_token", token.as_str())]),
        Err(e) => {
            warn!(err = %e, "invalid invite token");
            app_redirect(&state.app_url, &[("error_msg", "INVALID_TOKEN")])
        }
    }
}
