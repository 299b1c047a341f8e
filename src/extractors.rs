use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::auth::AuthenticatedIdentity;
use crate::error::AppError;
use crate::state::AppState;

/// Extractor that resolves the bearer credential into an identity.
/// Rejects with 401 before the handler runs, so an invalid credential
/// never reaches storage.
impl FromRequestParts<AppState> for AuthenticatedIdentity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(bearer_token)
            .ok_or(AppError::Unauthenticated)?;

        state.verifier.verify(token)
    }
}

fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}
