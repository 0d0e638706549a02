//! SQLite schema for the image metadata store.
//!
//! Three tables: `images` keyed by rowid-backed `image_id` with a unique
//! `full_path`, `tags` with unique names, and the `image_tags` association
//! with a uniqueness constraint on the pair. Listing sorts on
//! `COALESCE(exif_time, mtime)`, so that expression is indexed too.

use crate::sqlite_persistence::{Column, OnDelete, SqlType, Table, VersionedSchema};

const IMAGES_TABLE: Table = Table {
    name: "images",
    columns: &[
        Column::new("image_id", SqlType::Integer).primary_key(),
        Column::new("full_path", SqlType::Text).non_null().unique(),
        Column::new("mtime", SqlType::Integer).non_null(),
        Column::new("exif_time", SqlType::Integer),
        Column::new("hash", SqlType::Text),
    ],
    indices: &[
        ("idx_images_hash", "hash"),
        ("idx_images_image_time", "COALESCE(exif_time, mtime)"),
    ],
    unique_constraints: &[],
};

const TAGS_TABLE: Table = Table {
    name: "tags",
    columns: &[
        Column::new("tag_id", SqlType::Integer).primary_key(),
        Column::new("tag_name", SqlType::Text).non_null().unique(),
    ],
    indices: &[],
    unique_constraints: &[],
};

const IMAGE_TAGS_TABLE: Table = Table {
    name: "image_tags",
    columns: &[
        Column::new("image_tag_id", SqlType::Integer).primary_key(),
        Column::new("image_id", SqlType::Integer)
            .non_null()
            .references("images", "image_id", OnDelete::Cascade),
        Column::new("tag_id", SqlType::Integer)
            .non_null()
            .references("tags", "tag_id", OnDelete::Cascade),
    ],
    indices: &[
        ("idx_image_tags_image", "image_id"),
        ("idx_image_tags_tag", "tag_id"),
    ],
    unique_constraints: &[&["image_id", "tag_id"]],
};

pub const MEDIA_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[IMAGES_TABLE, TAGS_TABLE, IMAGE_TAGS_TABLE],
    migration: None,
}];
