use super::error::ApiError;
use super::state::ServerState;
use crate::store::User;

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use tracing::{debug, warn};

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub token: String,
}

impl Session {
    pub fn user_id(&self) -> i64 {
        self.user.id
    }
}

pub const COOKIE_SESSION_TOKEN_KEY: &str = "session_token";
pub const HEADER_SESSION_TOKEN_KEY: &str = "Authorization";
const BEARER_PREFIX: &str = "Bearer ";

fn extract_session_token_from_cookies(parts: &Parts) -> Option<String> {
    CookieJar::from_headers(&parts.headers)
        .get(COOKIE_SESSION_TOKEN_KEY)
        .map(Cookie::value)
        .map(|s| s.to_string())
}

fn extract_session_token_from_headers(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(HEADER_SESSION_TOKEN_KEY)?.to_str().ok()?;
    let token = value.strip_prefix(BEARER_PREFIX).unwrap_or(value).trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

async fn extract_session_from_request_parts(
    parts: &Parts,
    ctx: &ServerState,
) -> Option<Session> {
    let token = match extract_session_token_from_headers(parts)
        .or_else(|| extract_session_token_from_cookies(parts))
    {
        None => {
            debug!("No token in headers nor cookies.");
            return None;
        }
        Some(x) => x,
    };

    let db = ctx.db.clone();
    let lookup_token = token.clone();
    let lookup = tokio::task::spawn_blocking(move || {
        let user = db.user_by_token(&lookup_token)?;
        if let Some(user) = &user {
            db.write_committed(|tx| tx.touch_last_seen(user.id))?;
        }
        Ok::<_, ApiError>(user)
    })
    .await;

    match lookup {
        Ok(Ok(Some(user))) => {
            debug!("Authenticated user_id={}", user.id);
            Some(Session { user, token })
        }
        Ok(Ok(None)) => {
            debug!("Token unknown or expired");
            None
        }
        Ok(Err(e)) => {
            warn!("Failed to resolve session token: {}", e);
            None
        }
        Err(e) => {
            warn!("Session lookup task failed: {}", e);
            None
        }
    }
}

impl FromRequestParts<ServerState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        extract_session_from_request_parts(parts, ctx)
            .await
            .ok_or(ApiError::Unauthorized)
    }
}

impl axum::extract::OptionalFromRequestParts<ServerState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(extract_session_from_request_parts(parts, ctx).await)
    }
}
