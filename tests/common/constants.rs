//! Shared constants for end-to-end tests
//!
//! This module contains all constants used across the test suite.
//! When test data or timeouts change, update only this file.

// ============================================================================
// Test Timestamps (epoch seconds)
// ============================================================================

/// 2020-05-01T10:00:00Z, the EXIF capture time embedded in `beach.jpg`
pub const CAPTURE_2020: i64 = 1_588_327_200;

/// 2021-05-01T10:00:00Z, the base filesystem mtime of the fixture photos
pub const MTIME_2021: i64 = 1_619_863_200;

// ============================================================================
// Fixture Photo Tree
// ============================================================================
//
// The standard tree created by `TestServer::spawn()`:
//
//   beach.jpg                     EXIF capture time in 2020, mtime in 2021
//   hills.jpg                     no EXIF, mtime 2021
//   albums/winter/slope.jpeg      no EXIF, mtime 2021
//   albums/winter/slope-copy.jpeg byte-identical copy of slope.jpeg
//   .hidden/ignored.jpg           must never be scanned
//   notes.txt                     not an image, must never be scanned

pub const FIXTURE_BEACH: &str = "beach.jpg";
pub const FIXTURE_HILLS: &str = "hills.jpg";
pub const FIXTURE_SLOPE: &str = "albums/winter/slope.jpeg";
pub const FIXTURE_SLOPE_COPY: &str = "albums/winter/slope-copy.jpeg";

/// Number of images the standard fixture tree registers
pub const FIXTURE_IMAGE_COUNT: usize = 4;

/// Pixel size of the fixture JPEGs
pub const FIXTURE_JPEG_WIDTH: u32 = 200;
pub const FIXTURE_JPEG_HEIGHT: u32 = 150;

// ============================================================================
// Test Server Configuration
// ============================================================================

/// Width of the thumbnails generated by test servers (pixels)
pub const TEST_THUMBNAIL_WIDTH: u32 = 100;

/// Worker count used by test ingestion runs
pub const TEST_INGESTION_WORKERS: usize = 2;

// ============================================================================
// Test Timeouts
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Polling interval when waiting for server ready (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;

/// Timeout for individual HTTP requests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;
