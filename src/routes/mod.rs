pub mod login;
pub mod posts;
pub mod users;

use axum::Router;

use crate::state::AppState;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(posts::router())
        .merge(users::router())
        .merge(login::router())
}
