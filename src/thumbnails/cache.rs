//! On-disk thumbnail cache with single-flight generation.
//!
//! A cache hit serves the stored bytes as-is. On a miss the thumbnail is
//! generated from the original, written to a temporary file in the target
//! shard directory and published with an atomic rename, so readers only ever
//! observe a complete file. Concurrent misses for the same cache path share
//! one generation: the first request runs it, the rest wait for the outcome
//! and then read the disk again. The registry is keyed by the path rather
//! than the request parameters because the path is the contended resource:
//! an id has one cache file no matter what width each request asked for.

use crate::media_store::{thumbnail_rel_path, MetadataStore, StoreError};
use crate::thumbnails::generate::generate_thumbnail;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::time::timeout;

#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("no image with id {0}")]
    NotFound(i64),
    #[error("failed to process image: {0}")]
    Image(#[from] image::ImageError),
    #[error("thumbnail I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("thumbnail generation timed out")]
    Timeout,
    #[error("thumbnail generation for image {0} failed in another request")]
    GenerationFailed(i64),
    #[error("thumbnail generation task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct ThumbnailCacheConfig {
    pub generation_timeout: Duration,
}

impl Default for ThumbnailCacheConfig {
    fn default() -> Self {
        Self {
            generation_timeout: Duration::from_secs(10),
        }
    }
}

enum Role {
    Leader(watch::Sender<()>),
    Follower(watch::Receiver<()>),
}

pub struct ThumbnailCache {
    base_dir: PathBuf,
    store: Arc<dyn MetadataStore>,
    config: ThumbnailCacheConfig,
    in_flight: Mutex<HashMap<PathBuf, watch::Receiver<()>>>,
}

impl ThumbnailCache {
    pub fn new(
        base_dir: PathBuf,
        store: Arc<dyn MetadataStore>,
        config: ThumbnailCacheConfig,
    ) -> Self {
        Self {
            base_dir,
            store,
            config,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Serve the thumbnail for `image_id` at `width`, generating and caching
    /// it first if it is not on disk yet.
    pub async fn get_thumbnail(&self, image_id: i64, width: u32) -> Result<Vec<u8>, ThumbnailError> {
        let path = self.base_dir.join(thumbnail_rel_path(image_id));

        match tokio::fs::read(&path).await {
            Ok(bytes) => return Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let role = {
            let mut in_flight = self.in_flight.lock().await;
            match in_flight.get(&path) {
                // has_changed errs once the sender is gone, which only
                // happens for entries leaked by an aborted generation.
                Some(rx) if rx.has_changed().is_ok() => Role::Follower(rx.clone()),
                _ => {
                    let (tx, rx) = watch::channel(());
                    in_flight.insert(path.clone(), rx);
                    Role::Leader(tx)
                }
            }
        };

        match role {
            Role::Follower(mut rx) => {
                // The sender is dropped when the generation finishes,
                // successfully or not.
                let _ = rx.changed().await;
                match tokio::fs::read(&path).await {
                    Ok(bytes) => Ok(bytes),
                    Err(_) => Err(ThumbnailError::GenerationFailed(image_id)),
                }
            }
            Role::Leader(tx) => {
                let result = self.generate_and_publish(image_id, width, &path).await;
                self.in_flight.lock().await.remove(&path);
                drop(tx);
                result
            }
        }
    }

    async fn generate_and_publish(
        &self,
        image_id: i64,
        width: u32,
        path: &Path,
    ) -> Result<Vec<u8>, ThumbnailError> {
        let record = self
            .store
            .get_item(image_id)?
            .ok_or(ThumbnailError::NotFound(image_id))?;

        let source = PathBuf::from(&record.full_path);
        let generation = tokio::task::spawn_blocking(move || generate_thumbnail(&source, width));
        let encoded = match timeout(self.config.generation_timeout, generation).await {
            Ok(joined) => joined??,
            Err(_) => return Err(ThumbnailError::Timeout),
        };

        let parent = match path.parent() {
            Some(p) => p.to_path_buf(),
            None => self.base_dir.clone(),
        };
        tokio::fs::create_dir_all(&parent).await?;

        let final_path = path.to_path_buf();
        let encoded = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, ThumbnailError> {
            let mut tmp = NamedTempFile::new_in(&parent)?;
            tmp.write_all(&encoded)?;
            tmp.persist(&final_path).map_err(|e| ThumbnailError::Io(e.error))?;
            Ok(encoded)
        })
        .await??;

        Ok(encoded)
    }
}
