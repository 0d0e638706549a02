use anyhow::{Context, Result};
use clap::Parser;
use photo_cache_server::ingestion::{IngestionConfig, IngestionManager, IngestionProgress};
use photo_cache_server::media_store::SqliteMetadataStore;
use photo_cache_server::server::{run_server, RequestsLoggingLevel};
use photo_cache_server::thumbnails::{ThumbnailCache, ThumbnailCacheConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to the photo directory to scan.
    #[clap(value_parser = parse_path)]
    pub photos_dir: PathBuf,

    /// Path to the SQLite metadata database file.
    #[clap(long, default_value = "photo-cache.db", value_parser = parse_path)]
    pub db_path: PathBuf,

    /// Directory holding the generated thumbnails.
    #[clap(long, default_value = "thumbnail-cache", value_parser = parse_path)]
    pub cache_dir: PathBuf,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 8080)]
    pub port: u16,

    /// Number of parallel ingestion workers.
    #[clap(long, default_value_t = 4)]
    pub workers: usize,

    /// Width in pixels of the generated thumbnails.
    #[clap(long, default_value_t = 400)]
    pub thumbnail_width: u32,

    /// Timeout in seconds for a single thumbnail generation.
    #[clap(long, default_value_t = 10)]
    pub generation_timeout_sec: u64,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// The maximum age of content in the cache in seconds.
    #[clap(long, default_value_t = 3600)]
    pub content_cache_age_sec: usize,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// Interval in minutes between automatic rescans. Set to 0 to disable.
    #[clap(long, default_value_t = 0)]
    pub rescan_interval_minutes: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    info!("Opening media database at {:?}...", cli_args.db_path);
    let store = Arc::new(SqliteMetadataStore::new(
        &cli_args.db_path,
        cli_args.workers,
    )?);

    let thumbnails = Arc::new(ThumbnailCache::new(
        cli_args.cache_dir.clone(),
        store.clone(),
        ThumbnailCacheConfig {
            generation_timeout: Duration::from_secs(cli_args.generation_timeout_sec),
        },
    ));
    let progress = Arc::new(IngestionProgress::default());

    let manager = Arc::new(IngestionManager::new(
        store.clone(),
        thumbnails.clone(),
        progress.clone(),
        cli_args.photos_dir.clone(),
        IngestionConfig {
            workers: cli_args.workers,
            reference_thumbnail_width: cli_args.thumbnail_width,
        },
    ));

    // The initial ingestion runs in the background, the server is usable
    // right away and reports its progress via the summary endpoint.
    let initial_manager = manager.clone();
    tokio::spawn(async move {
        match initial_manager.run().await {
            Ok(summary) => info!(
                "Initial ingestion finished: {} scanned, {} registered, {} prepared",
                summary.scanned, summary.registered, summary.prepared
            ),
            Err(e) => error!("Initial ingestion failed: {}", e),
        }
    });

    if cli_args.rescan_interval_minutes > 0 {
        let interval_minutes = cli_args.rescan_interval_minutes;
        let rescan_manager = manager.clone();

        info!("Rescan enabled: every {} minutes", interval_minutes);

        tokio::spawn(async move {
            let interval = Duration::from_secs(interval_minutes * 60);
            let mut ticker = tokio::time::interval(interval);

            // Skip the first immediate tick, wait for the first interval
            ticker.tick().await;

            loop {
                ticker.tick().await;

                match rescan_manager.run().await {
                    Ok(summary) => info!(
                        "Rescan finished: {} scanned, {} registered, {} prepared",
                        summary.scanned, summary.registered, summary.prepared
                    ),
                    Err(e) => error!("Rescan failed: {}", e),
                }
            }
        });
    }

    info!("Ready to serve at port {}!", cli_args.port);
    run_server(
        store,
        thumbnails,
        progress,
        cli_args.logging_level,
        cli_args.port,
        cli_args.thumbnail_width,
        cli_args.content_cache_age_sec,
        cli_args.frontend_dir_path,
    )
    .await
}
