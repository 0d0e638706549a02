//! Photo ingestion pipeline.
//!
//! A run is two passes over the photo tree:
//! 1. Scan and register: walk the tree, resolve EXIF capture times, upsert
//!    every jpeg into the metadata store and attach system tags.
//! 2. Prepare: hash each registered file's content and warm its thumbnail.
//!
//! Per-file failures are logged and skipped, they never abort the run.
//! Progress counters are readable at any time while a run is going.

mod exif;
mod hashing;
mod manager;
mod progress;
mod scanner;
mod tagging;

pub use exif::resolve_capture_time;
pub use hashing::hash_file;
pub use manager::{IngestError, IngestionConfig, IngestionManager, RunSummary};
pub use progress::{IngestionProgress, ProgressSnapshot};
pub use scanner::{scan_tree, ScanError};
pub use tagging::{apply_system_tags, system_tags_for};
