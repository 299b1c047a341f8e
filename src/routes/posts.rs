use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::auth::AuthenticatedIdentity;
use crate::db::models::{Post, PostId, PostListing};
use crate::error::{AppError, AppResult};
use crate::posts::{PostDraft, PostPatch};
use crate::state::AppState;
use crate::stats::{self, AuthorCount, AuthorLikes};

/// Anyone may list posts; no credential required.
async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<PostListing>>> {
    Ok(Json(state.posts.list().await?))
}

async fn create(
    State(state): State<AppState>,
    identity: AuthenticatedIdentity,
    Json(draft): Json<PostDraft>,
) -> AppResult<(StatusCode, Json<Post>)> {
    let post = state.posts.create(identity, draft).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn update(
    State(state): State<AppState>,
    identity: AuthenticatedIdentity,
    Path(id): Path<PostId>,
    Json(patch): Json<PostPatch>,
) -> AppResult<Json<Post>> {
    let post = state
        .posts
        .update(identity, id, patch)
        .await
        .map_err(mask_missing)?;
    Ok(Json(post))
}

async fn remove(
    State(state): State<AppState>,
    identity: AuthenticatedIdentity,
    Path(id): Path<PostId>,
) -> AppResult<StatusCode> {
    state
        .posts
        .delete(identity, id)
        .await
        .map_err(mask_missing)?;
    Ok(StatusCode::NO_CONTENT)
}

/// On the mutation paths a missing post and a post owned by someone
/// else produce the same generic permission failure, so callers cannot
/// probe which ids exist.
fn mask_missing(err: AppError) -> AppError {
    match err {
        AppError::NotFound => AppError::Forbidden,
        other => other,
    }
}

#[derive(Serialize)]
struct StatsReport {
    total_likes: i64,
    favorite_blog: Option<Post>,
    most_blogs: Option<AuthorCount>,
    most_likes: Option<AuthorLikes>,
}

/// Aggregate report over all posts. Read-only, no authorization
/// coupling with the mutation pipeline.
async fn report(State(state): State<AppState>) -> AppResult<Json<StatsReport>> {
    let posts = state.post_store.find_all().await?;

    Ok(Json(StatsReport {
        total_likes: stats::total_likes(&posts),
        favorite_blog: stats::favorite_blog(&posts).cloned(),
        most_blogs: stats::most_blogs(&posts),
        most_likes: stats::most_likes(&posts),
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list).post(create))
        .route("/posts/stats", get(report))
        .route("/posts/{id}", axum::routing::put(update).delete(remove))
}
