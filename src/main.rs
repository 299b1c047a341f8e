use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use bloglist::auth::{tokens, TokenVerifier};
use bloglist::config::{Cli, Config};
use bloglist::posts::store::{SqlitePostStore, SqliteUserStore};
use bloglist::posts::PostService;
use bloglist::state::AppState;
use bloglist::{db, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Initialize database
    let pool = db::create_pool(config.db_path())?;
    db::run_migrations(&pool)?;

    // Token secret: configured, or generated for this process only
    let secret = match config.auth.secret.clone() {
        Some(secret) => secret,
        None => {
            tracing::warn!("No token secret configured; tokens will not survive a restart");
            tokens::generate_secret()
        }
    };

    // Build app state
    let user_store = Arc::new(SqliteUserStore::new(pool.clone()));
    let post_store = Arc::new(SqlitePostStore::new(pool));
    let state = AppState {
        config: config.clone(),
        verifier: Arc::new(TokenVerifier::new(secret)),
        user_store: user_store.clone(),
        post_store: post_store.clone(),
        posts: Arc::new(PostService::new(user_store, post_store)),
    };

    // Build router
    let app = routes::api_router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
