use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};

use super::{claims::Claims, jwt::JwtKeys, services};
use crate::{error::AppError, state::AppState};

/// Guard for protected routes: yields the authenticated user ID.
pub struct AuthUser(pub i64);

/// Like [`AuthUser`] but keeps the whole claim set; logout needs the jti.
pub struct CurrentToken(pub Claims);

/// Reads `Authorization: Bearer <token>`. Any other scheme, or a blank
/// token, counts as no token.
fn bearer(parts: &Parts) -> Option<&str> {
    let auth = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentToken {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let claims = services::authenticate(&keys, state.ledger.as_ref(), bearer(parts)).await?;
        Ok(CurrentToken(claims))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentToken(claims) = CurrentToken::from_request_parts(parts, state).await?;
        Ok(AuthUser(claims.sub))
    }
}
