use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::password;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    token: String,
    username: String,
    name: Option<String>,
}

async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> AppResult<Json<TokenResponse>> {
    let user = state
        .user_store
        .find_by_username(&credentials.username)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    if !password::verify(&credentials.password, &user.password_hash) {
        return Err(AppError::Unauthenticated);
    }

    let token = state
        .verifier
        .issue(user.id, state.config.auth.token_hours);

    Ok(Json(TokenResponse {
        token,
        username: user.username,
        name: user.name,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/login", post(login))
}
