//! Pure in-memory thumbnail generation.

use image::codecs::jpeg::JpegEncoder;
use std::path::Path;

pub const THUMBNAIL_JPEG_QUALITY: u8 = 80;

/// Decode the image at `source`, scale it to `width` preserving the aspect
/// ratio, and return the result encoded as JPEG.
pub fn generate_thumbnail(source: &Path, width: u32) -> Result<Vec<u8>, image::ImageError> {
    let original = image::open(source)?;
    let target_height = ((original.height() as u64 * width as u64) / original.width() as u64)
        .max(1) as u32;
    let thumbnail = original.thumbnail(width, target_height);

    let mut encoded = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut encoded, THUMBNAIL_JPEG_QUALITY);
    thumbnail.write_with_encoder(encoder)?;
    Ok(encoded)
}
