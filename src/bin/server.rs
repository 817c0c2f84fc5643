//! HTTP server: accepts CSV uploads and loads them in the background.

use nested_csv_loader::db::{init_pool, PgUserStore, UserStore};
use nested_csv_loader::logging::init_tracing;
use nested_csv_loader::server::{serve, ServerState};
use nested_csv_loader::LoaderConfig;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = LoaderConfig::from_env();
    info!(
        "Batch size {}, uploads stored in {}",
        config.batch_size,
        config.upload_dir.display()
    );

    let pool = init_pool(&config).await?;
    let store = PgUserStore::new(pool);
    if let Err(e) = store.ensure_schema().await {
        warn!("Could not ensure users table exists: {}", e);
    }

    let state = Arc::new(ServerState {
        store: Arc::new(store),
        config,
    });
    serve(state).await?;
    Ok(())
}
