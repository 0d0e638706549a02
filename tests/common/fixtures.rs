//! Photo tree fixtures for end-to-end tests
//!
//! Fixture JPEGs are generated in memory so no binary blobs live in the
//! repository. EXIF capture times are spliced into the encoded JPEG as an
//! APP1 segment, the same shape real cameras write.

use super::constants::*;
use anyhow::Result;
use exif::experimental::Writer;
use exif::{Field, In, Tag, Value};
use filetime::FileTime;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use std::fs;
use std::io::Cursor;
use std::path::Path;
use tempfile::TempDir;

/// Encode a small JPEG whose pixel content depends on `seed`, so different
/// fixture photos never hash alike by accident.
fn encode_jpeg(seed: u8) -> Vec<u8> {
    let img = RgbImage::from_fn(FIXTURE_JPEG_WIDTH, FIXTURE_JPEG_HEIGHT, |x, y| {
        Rgb([
            seed.wrapping_add(x as u8),
            seed.wrapping_mul(3).wrapping_add(y as u8),
            seed,
        ])
    });
    let mut encoded = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut encoded, 90);
    img.write_with_encoder(encoder)
        .expect("Failed to encode fixture JPEG");
    encoded
}

/// Splice an EXIF `DateTimeOriginal` into `jpeg` as an APP1 segment right
/// after the SOI marker.
fn with_capture_time(jpeg: &[u8], datetime: &str) -> Vec<u8> {
    let mut writer = Writer::new();
    let field = Field {
        tag: Tag::DateTimeOriginal,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![datetime.as_bytes().to_vec()]),
    };
    writer.push_field(&field);
    let mut buf = Cursor::new(Vec::new());
    writer
        .write(&mut buf, false)
        .expect("Failed to write EXIF segment");
    let exif = buf.into_inner();

    let mut out = Vec::with_capacity(jpeg.len() + exif.len() + 10);
    out.extend_from_slice(&jpeg[..2]); // SOI
    out.extend_from_slice(&[0xff, 0xe1]);
    out.extend_from_slice(&((exif.len() + 8) as u16).to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend_from_slice(&exif);
    out.extend_from_slice(&jpeg[2..]);
    out
}

fn write_with_mtime(root: &Path, rel: &str, bytes: &[u8], mtime: i64) -> Result<()> {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, bytes)?;
    filetime::set_file_mtime(&path, FileTime::from_unix_time(mtime, 0))?;
    Ok(())
}

/// Creates the standard fixture photo tree documented in `constants.rs`.
pub fn create_photo_tree() -> Result<TempDir> {
    let dir = TempDir::new()?;
    let root = dir.path();

    let beach = with_capture_time(&encode_jpeg(10), "2020:05:01 10:00:00");
    write_with_mtime(root, FIXTURE_BEACH, &beach, MTIME_2021)?;

    write_with_mtime(root, FIXTURE_HILLS, &encode_jpeg(70), MTIME_2021 + 60)?;

    let slope = encode_jpeg(130);
    write_with_mtime(root, FIXTURE_SLOPE, &slope, MTIME_2021 + 120)?;
    write_with_mtime(root, FIXTURE_SLOPE_COPY, &slope, MTIME_2021 + 180)?;

    // Never scanned: hidden directory and a non-image file.
    write_with_mtime(root, ".hidden/ignored.jpg", &encode_jpeg(200), MTIME_2021)?;
    fs::write(root.join("notes.txt"), b"not an image")?;

    Ok(dir)
}

/// Creates an empty photo tree.
pub fn create_empty_photo_tree() -> Result<TempDir> {
    Ok(TempDir::new()?)
}
