//! Capture-time extraction from EXIF metadata.
//!
//! Tag precedence is `DateTimeOriginal`, then `DateTimeDigitized`, then
//! `DateTime`, then the GPS date/time pair. All values are interpreted as
//! UTC and returned in epoch seconds. A file with no usable EXIF time
//! yields `None`, never an error.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use exif::{Exif, In, Reader, Tag, Value};
use lazy_static::lazy_static;
use regex::Regex;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

lazy_static! {
    // Four digits, then five two-digit groups, each pair separated by a
    // single non-digit. Accepts the odd "2020-05-01T10:00:00" style strings
    // some cameras write instead of the standard colon format.
    static ref RAW_DATETIME: Regex =
        Regex::new(r"(\d{4})\D(\d{2})\D(\d{2})\D(\d{2})\D(\d{2})\D(\d{2})").unwrap();
}

const DATETIME_TAGS: [Tag; 3] = [Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime];

fn parse_datetime_strict(value: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(value, "%Y:%m:%d %H:%M:%S")
        .ok()
        .map(|dt| dt.and_utc().timestamp())
}

fn parse_datetime_raw(value: &str) -> Option<i64> {
    let captures = RAW_DATETIME.captures(value)?;
    let field = |i: usize| captures.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
    let date = NaiveDate::from_ymd_opt(field(1)? as i32, field(2)?, field(3)?)?;
    let time = NaiveTime::from_hms_opt(field(4)?, field(5)?, field(6)?)?;
    Some(NaiveDateTime::new(date, time).and_utc().timestamp())
}

fn parse_datetime(value: &str) -> Option<i64> {
    parse_datetime_strict(value).or_else(|| parse_datetime_raw(value))
}

fn ascii_value(exif: &Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match &field.value {
        Value::Ascii(lines) if !lines.is_empty() => {
            let text = String::from_utf8_lossy(&lines[0]);
            let trimmed = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        _ => None,
    }
}

fn gps_epoch_secs(exif: &Exif) -> Option<i64> {
    let date = ascii_value(exif, Tag::GPSDateStamp)?;
    let mut parts = date.split(':');
    let year = parts.next()?.parse::<i32>().ok()?;
    let month = parts.next()?.parse::<u32>().ok()?;
    let day = parts.next()?.parse::<u32>().ok()?;

    let time_field = exif.get_field(Tag::GPSTimeStamp, In::PRIMARY)?;
    let (hour, minute, second) = match &time_field.value {
        // Sub-second precision is discarded, the schema stores whole seconds.
        Value::Rational(parts) if parts.len() >= 3 => (
            parts[0].to_f64() as u32,
            parts[1].to_f64() as u32,
            parts[2].to_f64() as u32,
        ),
        _ => return None,
    };

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let time = NaiveTime::from_hms_opt(hour, minute, second)?;
    Some(NaiveDateTime::new(date, time).and_utc().timestamp())
}

fn capture_time_from_exif(exif: &Exif) -> Option<i64> {
    for tag in DATETIME_TAGS {
        if let Some(ts) = ascii_value(exif, tag).and_then(|v| parse_datetime(&v)) {
            return Some(ts);
        }
    }
    gps_epoch_secs(exif)
}

/// Extract the capture time of the image at `path`, in epoch seconds.
///
/// Returns `None` for files without EXIF data, with unparseable values, or
/// that cannot be read at all.
pub fn resolve_capture_time(path: &Path) -> Option<i64> {
    let file = File::open(path).ok()?;
    let exif = Reader::new().read_from_container(&mut BufReader::new(file)).ok()?;
    capture_time_from_exif(&exif)
}
