//! Token validation failures.

use thiserror::Error;

/// Why a request could not be authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No bearer token on the request.
    #[error("Request must contain an access token")]
    MissingToken,

    /// Bad signature, malformed token, wrong issuer or audience.
    #[error("Token is not valid")]
    InvalidToken,

    /// Signature is fine but `exp` has passed.
    #[error("Token has expired")]
    TokenExpired,

    /// The token's jti is on the blocklist.
    #[error("Token has been revoked")]
    TokenRevoked,
}

impl AuthError {
    /// Machine-readable code sent in the `error` field.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "authorization_required",
            AuthError::InvalidToken => "invalid_token",
            AuthError::TokenExpired => "token_expired",
            AuthError::TokenRevoked => "token_revoked",
        }
    }
}
