//! Request extractor for the authenticated tenant.

use crate::{
    api::models::users::CurrentUser,
    auth::session,
    errors::Error,
    AppState,
};
use axum::{extract::FromRequestParts, http::request::Parts};

/// Extract the current tenant from the session cookie if present and valid.
fn try_session_auth(parts: &Parts, config: &crate::config::Config) -> Option<CurrentUser> {
    let cookie_header = parts.headers.get(axum::http::header::COOKIE)?;
    let cookie_str = cookie_header.to_str().ok()?;
    let cookie_name = &config.session.cookie_name;

    for cookie in cookie_str.split(';') {
        let cookie = cookie.trim();
        if let Some((name, value)) = cookie.split_once('=') {
            if name == cookie_name {
                // Invalid or expired tokens are skipped rather than
                // surfaced; a stale cookie just means "not logged in".
                if let Ok(user) = session::verify_session_token(value, config) {
                    return Some(user);
                }
            }
        }
    }
    None
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        try_session_auth(parts, &state.config).ok_or(Error::Unauthenticated { message: None })
    }
}
