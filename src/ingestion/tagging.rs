//! System tags derived from image metadata.
//!
//! The only system tag today is the shot year, `S:<year>`, computed from the
//! effective image time (EXIF capture time when present, filesystem mtime
//! otherwise). Applying tags is idempotent.

use crate::media_store::{ImageRecord, MetadataStore, StoreError};
use chrono::{DateTime, Datelike};

/// Compute the system tags for `record`.
pub fn system_tags_for(record: &ImageRecord) -> Vec<String> {
    match DateTime::from_timestamp(record.image_time(), 0) {
        Some(ts) => vec![format!("S:{}", ts.year())],
        None => Vec::new(),
    }
}

/// Ensure every system tag for `record` exists and is associated with it.
pub fn apply_system_tags(store: &dyn MetadataStore, record: &ImageRecord) -> Result<(), StoreError> {
    for tag_name in system_tags_for(record) {
        let tag_id = store.ensure_tag(&tag_name)?;
        store.add_image_tag(record.image_id, tag_id)?;
    }
    Ok(())
}
