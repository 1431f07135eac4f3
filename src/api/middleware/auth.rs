use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use crate::{
    api::state::AppState,
    auth::SESSION_COOKIE,
    domain::Account,
    error::AppError,
};

#[derive(Clone)]
pub struct CurrentUser {
    pub account: Account,
}

/// Session token from the `session` cookie, or a bearer token for API
/// clients.
fn session_token(jar: &CookieJar, request: &Request) -> Option<String> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
}

async fn resolve_account(state: &AppState, token: Option<String>) -> Result<Account, AppError> {
    let token = token.ok_or(AppError::Unauthorized)?;

    let session = state
        .service_context
        .auth_service
        .validate_session(&token)
        .await?
        .ok_or(AppError::Unauthorized)?;

    state
        .service_context
        .account_repo
        .find_by_id(session.user_id)
        .await?
        .ok_or(AppError::Unauthorized)
}

pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = session_token(&jar, &request);
    let account = resolve_account(&state, token).await?;

    request.extensions_mut().insert(CurrentUser { account });

    Ok(next.run(request).await)
}

pub async fn require_admin(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = session_token(&jar, &request);
    let account = resolve_account(&state, token).await?;

    if !account.is_admin {
        return Err(AppError::Forbidden);
    }

    request.extensions_mut().insert(CurrentUser { account });

    Ok(next.run(request).await)
}
