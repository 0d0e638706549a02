//! Thumbnail generation and the on-disk cache in front of it.

mod cache;
mod generate;

pub use cache::{ThumbnailCache, ThumbnailCacheConfig, ThumbnailError};
pub use generate::{generate_thumbnail, THUMBNAIL_JPEG_QUALITY};
