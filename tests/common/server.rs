//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own photo tree, metadata
//! database and thumbnail cache.

use super::constants::*;
use super::fixtures::{create_empty_photo_tree, create_photo_tree};
use photo_cache_server::ingestion::{
    IngestionConfig, IngestionManager, IngestionProgress, RunSummary,
};
use photo_cache_server::media_store::SqliteMetadataStore;
use photo_cache_server::server::server::make_app;
use photo_cache_server::server::{RequestsLoggingLevel, ServerConfig};
use photo_cache_server::thumbnails::{ThumbnailCache, ThumbnailCacheConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance with an isolated photo tree and database
///
/// When dropped, the server gracefully shuts down and temp resources are
/// cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Metadata store for direct database access in tests
    pub store: Arc<SqliteMetadataStore>,

    /// Root of the photo tree served by this instance
    pub photos_dir: PathBuf,

    manager: Arc<IngestionManager>,

    // Private fields - keep resources alive until drop
    _temp_photos: TempDir,
    _temp_data: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a test server over the standard fixture photo tree.
    ///
    /// Ingestion does not run automatically; call [`TestServer::ingest`] to
    /// drive it, so each test controls when the store is populated.
    pub async fn spawn() -> Self {
        let photos = create_photo_tree().expect("Failed to create fixture photo tree");
        Self::spawn_with_tree(photos).await
    }

    /// Spawns a test server over an empty photo tree.
    pub async fn spawn_empty() -> Self {
        let photos = create_empty_photo_tree().expect("Failed to create empty photo tree");
        Self::spawn_with_tree(photos).await
    }

    async fn spawn_with_tree(temp_photos: TempDir) -> Self {
        let temp_data = TempDir::new().expect("Failed to create data dir");
        let photos_dir = temp_photos.path().to_path_buf();

        let store = Arc::new(
            SqliteMetadataStore::new(temp_data.path().join("media.db"), TEST_INGESTION_WORKERS)
                .expect("Failed to open metadata store"),
        );

        let thumbnails = Arc::new(ThumbnailCache::new(
            temp_data.path().join("thumbs"),
            store.clone(),
            ThumbnailCacheConfig::default(),
        ));

        let progress = Arc::new(IngestionProgress::default());

        let manager = Arc::new(IngestionManager::new(
            store.clone(),
            thumbnails.clone(),
            progress.clone(),
            photos_dir.clone(),
            IngestionConfig {
                workers: TEST_INGESTION_WORKERS,
                reference_thumbnail_width: TEST_THUMBNAIL_WIDTH,
            },
        ));

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            thumbnail_width: TEST_THUMBNAIL_WIDTH,
            content_cache_age_sec: 0, // Disable caching in tests
            frontend_dir_path: None,
        };

        let app = make_app(config, store.clone(), thumbnails, progress)
            .expect("Failed to build app");

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            store,
            photos_dir,
            manager,
            _temp_photos: temp_photos,
            _temp_data: temp_data,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Runs one full ingestion pass over the photo tree and waits for it to
    /// finish. Can be called repeatedly to exercise rescans.
    pub async fn ingest(&self) -> RunSummary {
        self.manager.run().await.expect("Ingestion run failed")
    }

    /// Absolute path of a fixture photo, as the store records it.
    pub fn photo_path(&self, rel: &str) -> String {
        self.photos_dir.join(rel).to_string_lossy().into_owned()
    }

    /// Waits for the server to become ready by polling the home endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => {
                    return;
                }
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Send shutdown signal
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
        // TempDirs are cleaned up automatically
    }
}
