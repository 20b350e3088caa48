//! Admin token authentication for engine-facing routes

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::app::AppState;

/// SHA-256 digest of a token
pub fn token_digest(token: &str) -> [u8; 32] {
    Sha256::digest(token.as_bytes()).into()
}

/// Check a presented token against the expected digest.
///
/// Comparing fixed-size digests keeps the comparison independent of the
/// presented token's length.
pub fn verify_token(presented: &str, expected_digest: &[u8; 32]) -> bool {
    let presented = token_digest(presented);
    presented
        .iter()
        .zip(expected_digest.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// Authentication error types
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingHeader,

    #[error("Invalid token")]
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, self.to_string()).into_response()
    }
}

/// Middleware to require the admin bearer token
pub async fn require_admin(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let TypedHeader(Authorization(bearer)) = auth.ok_or(AuthError::MissingHeader)?;

    if !verify_token(bearer.token(), &state.admin_token_digest) {
        warn!(path = %request.uri().path(), "Rejected request with invalid admin token");
        return Err(AuthError::InvalidToken);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_verification() {
        let digest = token_digest("hunter2");
        assert!(verify_token("hunter2", &digest));
        assert!(!verify_token("hunter3", &digest));
        assert!(!verify_token("", &digest));
    }

    #[test]
    fn digest_is_hex_stable() {
        assert_eq!(
            hex::encode(token_digest("abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
