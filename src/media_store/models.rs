//! Models for the SQLite-backed image metadata store.

use serde::{Deserialize, Serialize};

/// A candidate file reported by the scanner: its absolute path and filesystem
/// modification time in epoch seconds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileInfo {
    pub full_path: String,
    pub mtime: i64,
}

/// A stored image. `image_id` is assigned by the store on first sighting of
/// `full_path` and never changes afterwards; `exif_time` and `hash` are filled
/// in by later ingestion passes when available.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub image_id: i64,
    pub full_path: String,
    pub mtime: i64,
    pub exif_time: Option<i64>,
    pub hash: Option<String>,
}

impl ImageRecord {
    /// The authoritative display timestamp: EXIF capture time when known,
    /// filesystem mtime otherwise. Always defined.
    pub fn image_time(&self) -> i64 {
        self.exif_time.unwrap_or(self.mtime)
    }
}

/// Wire shape for one entry of a listing page.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSummary {
    pub image_id: i64,
    pub image_time: i64,
}

impl From<&ImageRecord> for ImageSummary {
    fn from(record: &ImageRecord) -> Self {
        ImageSummary {
            image_id: record.image_id,
            image_time: record.image_time(),
        }
    }
}

/// A tag name together with how many images carry it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagCount {
    pub tag_name: String,
    pub number_of_images: i64,
}

/// A content hash shared by more than one stored path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub hash: String,
    pub full_paths: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn to_sql(self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

/// Paging and filtering for image listings. Results are ordered by image
/// time (ties broken by id); `offset`/`limit` apply after ordering. At most
/// one tag can be filtered on per query.
#[derive(Clone, Debug)]
pub struct ListFilter {
    pub order: SortOrder,
    pub offset: usize,
    pub limit: usize,
    pub tag_name: Option<String>,
}
