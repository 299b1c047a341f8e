use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::auth::password;
use crate::db::models::{User, UserId};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

const MIN_CREDENTIAL_LEN: usize = 3;

#[derive(Debug, Deserialize)]
struct NewUser {
    username: Option<String>,
    name: Option<String>,
    password: Option<String>,
}

async fn register(
    State(state): State<AppState>,
    Json(new_user): Json<NewUser>,
) -> AppResult<(StatusCode, Json<User>)> {
    let username = new_user
        .username
        .filter(|u| u.len() >= MIN_CREDENTIAL_LEN)
        .ok_or_else(|| {
            AppError::Validation("username must be at least 3 characters long".into())
        })?;
    let password = new_user
        .password
        .filter(|p| p.len() >= MIN_CREDENTIAL_LEN)
        .ok_or_else(|| {
            AppError::Validation("password must be at least 3 characters long".into())
        })?;

    if state.user_store.find_by_username(&username).await?.is_some() {
        return Err(AppError::Validation("username must be unique".into()));
    }

    let user = User {
        id: UserId::generate(),
        username,
        name: new_user.name,
        password_hash: password::hash(&password)?,
        post_ids: vec![],
    };
    state.user_store.insert(&user).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<User>>> {
    Ok(Json(state.user_store.find_all().await?))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/users", get(list).post(register))
}
