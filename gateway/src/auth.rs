//! Gateway authentication
//!
//! The gateway terminates bearer-token auth: routes declare whether a
//! token is forbidden from failing (`Required`), used when present
//! (`Optional`), or ignored (`None`). Verified claims become the
//! `x-user-id` header on the upstream request; services never see the
//! token itself being trusted.

use axum::http::HeaderMap;

use shared::{AppError, AppResult, Claims, JwtService};

/// Authentication requirement for a route prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// No token handling at all (e.g. login, register, webhooks)
    None,
    /// Claims attached when a valid token is present; anonymous otherwise
    Optional,
    /// Valid token required; 401 otherwise
    Required,
}

/// Resolve the caller's claims for the given mode
pub fn authenticate(
    jwt: &JwtService,
    headers: &HeaderMap,
    mode: AuthMode,
) -> AppResult<Option<Claims>> {
    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(JwtService::extract_from_header);

    match (token, mode) {
        (_, AuthMode::None) => Ok(None),
        (Some(token), AuthMode::Required) => jwt.validate_token(token).map(Some),
        // a bad token on an optional route degrades to anonymous
        (Some(token), AuthMode::Optional) => Ok(jwt.validate_token(token).ok()),
        (None, AuthMode::Required) => Err(AppError::Unauthorized),
        (None, AuthMode::Optional) => Ok(None),
    }
}
