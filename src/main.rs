use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nested_csv_loader::db::{init_pool, MemoryUserStore, PgUserStore, UserStore};
use nested_csv_loader::ingestion::IngestionCoordinator;
use nested_csv_loader::logging::init_tracing;
use nested_csv_loader::LoaderConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "nested-csv-loader")]
#[command(about = "Load CSV files with dotted headers into PostgreSQL as nested records")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a CSV file and print the age distribution
    Ingest {
        /// CSV file to load (waited for if it does not exist yet)
        file: PathBuf,

        /// Rows per insert statement (overrides BATCH_SIZE)
        #[arg(long)]
        batch_size: Option<usize>,

        /// Load into an in-memory store instead of PostgreSQL
        #[arg(long)]
        dry_run: bool,
    },
    /// Delete every stored row
    Clear,
    /// Check the database connection
    Ping,
    /// Print the age distribution of stored rows
    Report,
    /// Create the users table if it does not exist
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let args = Args::parse();
    let config = LoaderConfig::from_env();

    match args.command {
        Commands::Ingest {
            file,
            batch_size,
            dry_run,
        } => {
            let config = match batch_size {
                Some(size) => config.with_batch_size(size),
                None => config,
            };
            let store: Arc<dyn UserStore> = if dry_run {
                info!("Dry run: rows are kept in memory");
                Arc::new(MemoryUserStore::new())
            } else {
                Arc::new(connect(&config).await?)
            };

            let mut coordinator = IngestionCoordinator::new(store, config.batch_size);
            let summary = match coordinator.run_file(&file, None, config.poll_interval).await {
                Ok(summary) => summary,
                Err(e) => {
                    error!("Ingestion failed: {}", e);
                    return Err(e.into());
                }
            };

            println!("\n=== Ingestion Summary ===");
            println!("Run:               {}", summary.run_id);
            println!("Rows processed:    {}", summary.rows_processed);
            println!("Rows skipped:      {}", summary.rows_skipped);
            println!("Rows rejected:     {}", summary.rows_rejected);
            println!("Batches submitted: {}", summary.batches_submitted);
            println!("Rows inserted:     {}", summary.rows_inserted);
            println!("Read time:         {:.2}s", summary.read_elapsed.as_secs_f64());
            if let Some(report) = summary.report {
                println!("\n{}", report);
            }
        }
        Commands::Clear => {
            let store = connect(&config).await?;
            let deleted = store.clear().await.context("Failed to clear database")?;
            println!("Database cleared successfully ({} rows).", deleted);
        }
        Commands::Ping => {
            let store = connect(&config).await?;
            let now = store.now().await.context("Database not connected")?;
            println!("ok {}", now.to_rfc3339());
        }
        Commands::Report => {
            let store = connect(&config).await?;
            let report = store.age_distribution().await?;
            println!("{}", report);
        }
        Commands::Migrate => {
            let store = connect(&config).await?;
            store.ensure_schema().await?;
            println!("users table ready");
        }
    }

    Ok(())
}

async fn connect(config: &LoaderConfig) -> Result<PgUserStore> {
    let pool = init_pool(config)
        .await
        .context("Failed to connect to PostgreSQL")?;
    Ok(PgUserStore::new(pool))
}
