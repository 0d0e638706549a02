mod models;
mod schema;
mod shard;
mod store;

pub use models::*;
pub use schema::MEDIA_VERSIONED_SCHEMAS;
pub use shard::{thumbnail_rel_path, SHARD_FANOUT, THUMBNAIL_EXTENSION};
pub use store::{MetadataStore, SqliteMetadataStore, StoreError, UPSERT_CONFLICT_RETRIES};
