use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counters for the ingestion run in progress, shared behind an `Arc` so
/// pollers can read them while the run is going. Within a run `prepared` only
/// ever grows, one increment per file whose processing has finished (at
/// whatever stage it succeeded or gave up), so it always converges to
/// `total`. Starting a new run resets both.
#[derive(Debug, Default)]
pub struct IngestionProgress {
    prepared: AtomicUsize,
    total: AtomicUsize,
}

/// Point-in-time view of the counters, serialized straight into the cache
/// summary endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub prepared_images: usize,
    pub total_images: usize,
}

impl IngestionProgress {
    pub fn begin_run(&self, total: usize) {
        self.prepared.store(0, Ordering::SeqCst);
        self.total.store(total, Ordering::SeqCst);
    }

    pub fn inc_prepared(&self) {
        self.prepared.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            prepared_images: self.prepared.load(Ordering::SeqCst),
            total_images: self.total.load(Ordering::SeqCst),
        }
    }
}
