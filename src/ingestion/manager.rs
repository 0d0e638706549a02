//! Ingestion orchestration.
//!
//! A run makes two sequential passes over the scanned photo tree:
//! 1. Register: resolve each file's EXIF capture time and upsert its row.
//! 2. Prepare: hash each registered file and warm its thumbnail.
//!
//! Within a pass, a pool of blocking workers does the file I/O and feeds a
//! single writer task through a channel. All database writes happen on the
//! writer, so workers never contend on the write connection. One bad file
//! is logged and skipped, it never stops the run.

use super::exif::resolve_capture_time;
use super::hashing::hash_file;
use super::progress::IngestionProgress;
use super::scanner::{scan_tree, ScanError};
use super::tagging::apply_system_tags;
use crate::media_store::{FileInfo, MetadataStore};
use crate::thumbnails::ThumbnailCache;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

const INGEST_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),

    #[error("Ingestion task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Configuration for the IngestionManager.
#[derive(Debug, Clone)]
pub struct IngestionConfig {
    /// Parallel file workers per pass.
    pub workers: usize,
    /// Width of the thumbnails warmed during the prepare pass.
    pub reference_thumbnail_width: u32,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            reference_thumbnail_width: 400,
        }
    }
}

/// Counts for one completed ingestion run.
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    /// Candidate files found by the scan.
    pub scanned: usize,
    /// Files with a metadata row after the register pass.
    pub registered: usize,
    /// Files whose content hash was stored during the prepare pass.
    pub prepared: usize,
}

enum PrepareOutcome {
    Hashed { image_id: i64, hash: String },
    Failed,
}

/// Runs ingestion passes over a photo tree.
pub struct IngestionManager {
    store: Arc<dyn MetadataStore>,
    thumbnails: Arc<ThumbnailCache>,
    progress: Arc<IngestionProgress>,
    photos_dir: PathBuf,
    config: IngestionConfig,
}

impl IngestionManager {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        thumbnails: Arc<ThumbnailCache>,
        progress: Arc<IngestionProgress>,
        photos_dir: PathBuf,
        config: IngestionConfig,
    ) -> Self {
        Self {
            store,
            thumbnails,
            progress,
            photos_dir,
            config,
        }
    }

    /// Scan the photo tree and run both ingestion passes over it.
    pub async fn run(&self) -> Result<RunSummary, IngestError> {
        let root = self.photos_dir.clone();
        let files = tokio::task::spawn_blocking(move || scan_tree(&root)).await??;
        let scanned = files.len();
        info!(
            "Scanned {}: {} candidate images",
            self.photos_dir.display(),
            scanned
        );

        self.progress.begin_run(scanned);

        let ids = self.register_files(files).await?;
        let registered = ids.len();

        let prepared = self.prepare_files(ids).await?;

        info!(
            "Ingestion run complete: {} scanned, {} registered, {} prepared",
            scanned, registered, prepared
        );
        Ok(RunSummary {
            scanned,
            registered,
            prepared,
        })
    }

    // =========================================================================
    // Pass 1: Register
    // =========================================================================

    async fn register_files(&self, files: Vec<FileInfo>) -> Result<Vec<i64>, IngestError> {
        let (tx, mut rx) = mpsc::channel::<(FileInfo, Option<i64>)>(INGEST_CHANNEL_CAPACITY);

        let mut workers = Vec::new();
        for chunk in split_into_chunks(files, self.config.workers) {
            let tx = tx.clone();
            workers.push(tokio::task::spawn_blocking(move || {
                for file in chunk {
                    let exif_time = resolve_capture_time(Path::new(&file.full_path));
                    if tx.blocking_send((file, exif_time)).is_err() {
                        return;
                    }
                }
            }));
        }
        drop(tx);

        let store = self.store.clone();
        let progress = self.progress.clone();
        let writer = tokio::spawn(async move {
            let mut ids = Vec::new();
            while let Some((file, exif_time)) = rx.recv().await {
                match store.upsert(&file, exif_time) {
                    Ok(id) => {
                        match store.get_item(id) {
                            Ok(Some(record)) => {
                                if let Err(e) = apply_system_tags(store.as_ref(), &record) {
                                    warn!("Failed to tag {}: {}", file.full_path, e);
                                }
                            }
                            Ok(None) => warn!("Registered image {} disappeared", id),
                            Err(e) => warn!("Failed to re-read image {}: {}", id, e),
                        }
                        ids.push(id);
                    }
                    Err(e) => {
                        warn!("Failed to register {}: {}", file.full_path, e);
                        // The file is finished for this run, it still counts
                        // towards the progress total.
                        progress.inc_prepared();
                    }
                }
            }
            ids
        });

        for joined in futures::future::join_all(workers).await {
            joined?;
        }
        let ids = writer.await?;
        info!("Registered {} images", ids.len());
        Ok(ids)
    }

    // =========================================================================
    // Pass 2: Prepare
    // =========================================================================

    async fn prepare_files(&self, ids: Vec<i64>) -> Result<usize, IngestError> {
        let (tx, mut rx) = mpsc::channel::<PrepareOutcome>(INGEST_CHANNEL_CAPACITY);

        let mut workers = Vec::new();
        for chunk in split_into_chunks(ids, self.config.workers) {
            let tx = tx.clone();
            let store = self.store.clone();
            workers.push(tokio::task::spawn_blocking(move || {
                for image_id in chunk {
                    let outcome = match store.get_item(image_id) {
                        Ok(Some(record)) => match hash_file(Path::new(&record.full_path)) {
                            Ok(hash) => PrepareOutcome::Hashed { image_id, hash },
                            Err(e) => {
                                warn!("Failed to hash {}: {}", record.full_path, e);
                                PrepareOutcome::Failed
                            }
                        },
                        Ok(None) => {
                            warn!("Image {} disappeared before prepare", image_id);
                            PrepareOutcome::Failed
                        }
                        Err(e) => {
                            warn!("Failed to load image {}: {}", image_id, e);
                            PrepareOutcome::Failed
                        }
                    };
                    if tx.blocking_send(outcome).is_err() {
                        return;
                    }
                }
            }));
        }
        drop(tx);

        let store = self.store.clone();
        let thumbnails = self.thumbnails.clone();
        let progress = self.progress.clone();
        let width = self.config.reference_thumbnail_width;
        let writer = tokio::spawn(async move {
            let mut prepared = 0usize;
            while let Some(outcome) = rx.recv().await {
                if let PrepareOutcome::Hashed { image_id, hash } = outcome {
                    match store.get_item(image_id) {
                        Ok(Some(mut record)) => {
                            record.hash = Some(hash);
                            match store.update_record(&record) {
                                Ok(()) => prepared += 1,
                                Err(e) => {
                                    warn!("Failed to store hash for image {}: {}", image_id, e)
                                }
                            }
                        }
                        Ok(None) => warn!("Image {} disappeared before prepare", image_id),
                        Err(e) => warn!("Failed to load image {}: {}", image_id, e),
                    }
                    if let Err(e) = thumbnails.get_thumbnail(image_id, width).await {
                        warn!("Failed to warm thumbnail for image {}: {}", image_id, e);
                    }
                }
                progress.inc_prepared();
            }
            prepared
        });

        for joined in futures::future::join_all(workers).await {
            joined?;
        }
        let prepared = writer.await?;
        info!("Prepared {} images", prepared);
        Ok(prepared)
    }
}

fn split_into_chunks<T>(mut items: Vec<T>, chunks: usize) -> Vec<Vec<T>> {
    let chunk_size = items.len().div_ceil(chunks.max(1)).max(1);
    let mut out = Vec::new();
    while !items.is_empty() {
        let rest = items.split_off(chunk_size.min(items.len()));
        out.push(items);
        items = rest;
    }
    out
}
