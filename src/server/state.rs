use axum::extract::FromRef;

use crate::ingestion::IngestionProgress;
use crate::media_store::MetadataStore;
use crate::thumbnails::ThumbnailCache;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedMetadataStore = Arc<dyn MetadataStore>;
pub type GuardedThumbnailCache = Arc<ThumbnailCache>;
pub type GuardedProgress = Arc<IngestionProgress>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub store: GuardedMetadataStore,
    pub thumbnails: GuardedThumbnailCache,
    pub progress: GuardedProgress,
    pub hash: String,
}

impl FromRef<ServerState> for GuardedMetadataStore {
    fn from_ref(input: &ServerState) -> Self {
        input.store.clone()
    }
}

impl FromRef<ServerState> for GuardedThumbnailCache {
    fn from_ref(input: &ServerState) -> Self {
        input.thumbnails.clone()
    }
}

impl FromRef<ServerState> for GuardedProgress {
    fn from_ref(input: &ServerState) -> Self {
        input.progress.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
