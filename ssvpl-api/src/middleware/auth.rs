use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use ssvpl_core::AuthError;

use crate::{error::AppError, state::AppState};

// ============================================================================
// Admin Authentication Middleware
// ============================================================================

/// Guards every `/admin/*` route. The verified `AdminPrincipal` is handed to
/// handlers through request extensions.
pub async fn require_admin(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers())?;

    let principal = state.auth.verify(&token).await.map_err(|e| {
        tracing::debug!("Rejected {} {}: {}", req.method(), req.uri().path(), e.code());
        e
    })?;

    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}

/// Extracts the credential from `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Result<String, AuthError> {
    let header = headers.get(AUTHORIZATION).ok_or(AuthError::TokenMissing)?;
    let value = header.to_str().map_err(|_| AuthError::TokenInvalid)?.trim();

    let (scheme, token) = value.split_once(' ').ok_or(AuthError::TokenMissing)?;
    if !scheme.eq_ignore_ascii_case("Bearer") {
        return Err(AuthError::TokenInvalid);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::TokenMissing);
    }
    Ok(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
        assert_eq!(bearer_token(&headers("bearer   abc")).unwrap(), "abc");
    }

    #[test]
    fn test_missing_or_empty_token() {
        assert_eq!(bearer_token(&HeaderMap::new()), Err(AuthError::TokenMissing));
        assert_eq!(bearer_token(&headers("Bearer")), Err(AuthError::TokenMissing));
        assert_eq!(bearer_token(&headers("Bearer    ")), Err(AuthError::TokenMissing));
    }

    #[test]
    fn test_wrong_scheme_is_invalid() {
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwYXNz")), Err(AuthError::TokenInvalid));
    }
}
