use axum::{
    extract::{Query, State},
    response::Redirect,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use service::token::TokenCodec;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::app_redirect;
use super::session::session_cookie;
use crate::state::ServerState;

const SIGN_IN_FAILED: &str = "GITHUB_SIGN_IN_FAILED";
/// Holds the `state` sent to GitHub until the callback comes back.
pub const STATE_COOKIE: &str = "oauth_state";
const STATE_COOKIE_PATH: &str = "/api/github";

#[derive(Debug, Deserialize)]
pub struct SignInQuery {
    pub invite_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

fn state_cookie(value: String, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(STATE_COOKIE, value);
    cookie.set_path(STATE_COOKIE_PATH);
    cookie.set_http_only(true);
    cookie.set_secure(secure);
    cookie.set_same_site(SameSite::Lax);
    cookie
}

/// Send the browser to GitHub; an invite token rides along in `state`.
/// The same `state` is pinned in a cookie scoped to the callback.
pub async fn signin(
    State(state): State<ServerState>,
    jar: CookieJar,
    Query(q): Query<SignInQuery>,
) -> (CookieJar, Redirect) {
    let oauth_state = match q.invite_token.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        Some(invite) => TokenCodec::invite_state(invite),
        None => Uuid::new_v4().simple().to_string(),
    };
    let redirect = Redirect::temporary(&state.flow.provider().authorization_url(&oauth_state));
    (jar.add(state_cookie(oauth_state, state.secure_cookies())), redirect)
}

/// OAuth redirect target. `state` must match the cookie set by `signin`.
/// Success sets the session cookie; any failure goes back to the app with a
/// fixed error code and nothing else.
pub async fn callback(
    State(state): State<ServerState>,
    jar: CookieJar,
    Query(q): Query<CallbackQuery>,
) -> (CookieJar, Redirect) {
    let pinned = jar.get(STATE_COOKIE).map(|c| c.value().to_string());
    let mut stale = Cookie::from(STATE_COOKIE);
    stale.set_path(STATE_COOKIE_PATH);
    let jar = jar.remove(stale);

    let oauth_state = q.state.unwrap_or_default();
    if oauth_state.is_empty() || pinned.as_deref() != Some(oauth_state.as_str()) {
        warn!(has_cookie = pinned.is_some(), "github callback state does not match the signin cookie");
        return (jar, app_redirect(&state.app_url, &[("error_msg", SIGN_IN_FAILED)]));
    }
    let Some(code) = q.code.filter(|c| !c.is_empty()) else {
        error!("github callback without code");
        return (jar, app_redirect(&state.app_url, &[("error_msg", SIGN_IN_FAILED)]));
    };

    match state.flow.handle_callback(&code, &oauth_state).await {
        Ok(outcome) => {
            info!(email = %outcome.email, organisation_id = outcome.organisation_id, "github sign-in complete");
            let organisation_id = outcome.organisation_id.to_string();
            let redirect = app_redirect(
                &state.app_url,
                &[
                    ("name", outcome.name.as_str()),
                    ("email", outcome.email.as_str()),
                    ("user_exists", if outcome.existing_account { "true" } else { "false" }),
                    ("organisation_id", organisation_id.as_str()),
                ],
            );
            (jar.add(session_cookie(&state, outcome.session_token)), redirect)
        }
        Err(e) => {
            error!(code = e.code(), err = %e, "github sign-in failed");
            (jar, app_redirect(&state.app_url, &[("error_msg", SIGN_IN_FAILED)]))
        }
    }
}
