use axum::http::HeaderMap;

use super::auth::AuthService;
use crate::{
    banking::Actor,
    error::{LedgerError, LedgerResult},
};

/// Raw token from the `Authorization` header, with or without a `Bearer ` prefix.
#[inline]
pub fn auth_token(headers: &HeaderMap) -> LedgerResult<&str> {
    let jwt_header_token = match headers.get("Authorization").map(|token| token.to_str()) {
        Some(Ok(token)) => token.trim(),
        _ => {
            return Err(LedgerError::Unauthenticated);
        }
    };
    let token = jwt_header_token
        .strip_prefix("Bearer ")
        .unwrap_or(jwt_header_token)
        .trim();
    if token.is_empty() {
        return Err(LedgerError::Unauthenticated);
    }
    Ok(token)
}

#[inline]
pub async fn authenticate(headers: &HeaderMap, service: &AuthService) -> LedgerResult<Actor> {
    let token = auth_token(headers)?;
    //validate our token and resolve the role
    service.authenticate(token).await
}
