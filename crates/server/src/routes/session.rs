use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::state::{ServerState, AUTH_COOKIE};

/// `auth_token` cookie carrying a freshly issued session token.
pub(crate) fn session_cookie(state: &ServerState, token: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(AUTH_COOKIE, token);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_secure(state.secure_cookies());
    cookie.set_same_site(SameSite::Lax);
    cookie
}

/// Bearer token from `Authorization`, falling back to the `auth_token` cookie.
fn session_token(req: &Request) -> Result<Option<String>, StatusCode> {
    if let Some(h) = req.headers().get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        return match h.strip_prefix("Bearer ") {
            Some(t) if !t.trim().is_empty() => Ok(Some(t.trim().to_string())),
            _ => Err(StatusCode::UNAUTHORIZED),
        };
    }
    let jar = CookieJar::from_headers(req.headers());
    Ok(jar.get(AUTH_COOKIE).map(|c| c.value().to_string()).filter(|v| !v.is_empty()))
}

/// Verify the session token and expose its claims to handlers as an
/// `Extension<SessionClaims>`. Missing or invalid tokens get 401.
pub async fn require_session(State(state): State<ServerState>, mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let path = req.uri().path().to_string();
    let token = match session_token(&req) {
        Ok(Some(t)) => t,
        Ok(None) => {
            tracing::warn!(%path, "missing Authorization header and auth_token cookie");
            return Err(StatusCode::UNAUTHORIZED);
        }
        Err(status) => {
            tracing::warn!(%path, "invalid Authorization format (expect Bearer)");
            return Err(status);
        }
    };
    match state.tokens.decode_session(&token) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            Ok(next.run(req).await)
        }
        Err(e) => {
            tracing::warn!(%path, err = %e, "session validation failed");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
