//! Photo Cache Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod ingestion;
pub mod media_store;
pub mod server;
pub mod sqlite_persistence;
pub mod thumbnails;

// Re-export commonly used types for convenience
pub use ingestion::{IngestionConfig, IngestionManager, IngestionProgress};
pub use media_store::{MetadataStore, SqliteMetadataStore};
pub use server::{run_server, RequestsLoggingLevel, ServerConfig};
pub use thumbnails::{ThumbnailCache, ThumbnailCacheConfig};
