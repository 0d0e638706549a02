//! Recursive photo tree scan.
//!
//! Finds every regular file under the root with a `.jpg`/`.jpeg` extension
//! (any letter case). Entries whose name starts with a dot are skipped
//! outright: hidden files are not reported and hidden directories are not
//! descended into. Sibling subtrees of the root are walked in parallel. Any
//! unreadable directory fails the whole scan; callers never see a partial
//! listing. The order of the returned list is not meaningful.

use crate::media_store::FileInfo;
use rayon::prelude::*;
use std::ffi::OsStr;
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

fn is_hidden(name: &OsStr) -> bool {
    name.to_str().map(|n| n.starts_with('.')).unwrap_or(false)
}

fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
        .unwrap_or(false)
}

fn mtime_epoch_secs(metadata: &Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn walk_subtree(dir: &Path) -> Result<Vec<FileInfo>, ScanError> {
    let mut files = Vec::new();
    let walker = WalkDir::new(dir).into_iter();
    for entry in walker.filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name())) {
        let entry = entry.map_err(|e| ScanError::Walk {
            path: e
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| dir.to_path_buf()),
            source: e,
        })?;
        if !entry.file_type().is_file() || !is_jpeg(entry.path()) {
            continue;
        }
        let metadata = entry.metadata().map_err(|e| ScanError::Walk {
            path: entry.path().to_path_buf(),
            source: e,
        })?;
        files.push(FileInfo {
            full_path: entry.path().to_string_lossy().into_owned(),
            mtime: mtime_epoch_secs(&metadata),
        });
    }
    Ok(files)
}

/// Scan the photo tree rooted at `root` and return every candidate image
/// with its filesystem mtime in epoch seconds.
pub fn scan_tree(root: &Path) -> Result<Vec<FileInfo>, ScanError> {
    let mut files = Vec::new();
    let mut subdirs = Vec::new();

    let entries = fs::read_dir(root).map_err(|e| ScanError::Io {
        path: root.to_path_buf(),
        source: e,
    })?;
    for entry in entries {
        let entry = entry.map_err(|e| ScanError::Io {
            path: root.to_path_buf(),
            source: e,
        })?;
        if is_hidden(&entry.file_name()) {
            continue;
        }
        let file_type = entry.file_type().map_err(|e| ScanError::Io {
            path: entry.path(),
            source: e,
        })?;
        if file_type.is_dir() {
            subdirs.push(entry.path());
        } else if file_type.is_file() && is_jpeg(&entry.path()) {
            let metadata = entry.metadata().map_err(|e| ScanError::Io {
                path: entry.path(),
                source: e,
            })?;
            files.push(FileInfo {
                full_path: entry.path().to_string_lossy().into_owned(),
                mtime: mtime_epoch_secs(&metadata),
            });
        }
    }

    // Sibling subtrees are independent, walk them in parallel.
    let subtrees: Result<Vec<Vec<FileInfo>>, ScanError> =
        subdirs.par_iter().map(|dir| walk_subtree(dir)).collect();
    for subtree in subtrees? {
        files.extend(subtree);
    }

    Ok(files)
}
