use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::TokenVerifier;
use crate::config::Config;
use crate::posts::store::{PostStore, UserStore};
use crate::posts::PostService;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub verifier: Arc<TokenVerifier>,
    pub user_store: Arc<dyn UserStore>,
    pub post_store: Arc<dyn PostStore>,
    pub posts: Arc<PostService>,
}
