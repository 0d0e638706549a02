//! Maps image ids to cache file locations.
//!
//! Thumbnails live in a two-level tree so no single directory ever collects
//! more than [`SHARD_FANOUT`] entries: id 40000 becomes `0001/1c40.jpg`. The
//! mapping is pure arithmetic on the id, so it needs no persisted allocator
//! state and two processes always agree on where a thumbnail belongs.

use std::path::PathBuf;

/// Upper bound on entries per shard directory.
pub const SHARD_FANOUT: i64 = 32768;

/// Thumbnails are always encoded as JPEG.
pub const THUMBNAIL_EXTENSION: &str = "jpg";

/// Shard directory and file stem for an id, both zero-padded 4-digit hex.
pub fn shard_components(id: i64) -> (String, String) {
    (
        format!("{:04x}", id / SHARD_FANOUT),
        format!("{:04x}", id % SHARD_FANOUT),
    )
}

/// Cache path of an image's thumbnail, relative to the cache root.
pub fn thumbnail_rel_path(id: i64) -> PathBuf {
    let (parent, name) = shard_components(id);
    PathBuf::from(parent).join(format!("{}.{}", name, THUMBNAIL_EXTENSION))
}
