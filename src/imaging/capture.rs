//! EXIF capture metadata via `kamadak-exif`.
//!
//! Only the handful of tags the catalog shows are read: camera make/model,
//! exposure, aperture, ISO, focal length, lens, capture time, and GPS.
//! Extraction is best-effort per tag; a tag with an unexpected type is
//! skipped rather than failing the whole read.

use super::backend::{BackendError, CaptureMetadata, GpsPosition};
use chrono::{DateTime, NaiveDate, Utc};
use exif::{Exif, In, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Containers `kamadak-exif` can read EXIF from.
const EXIF_CONTAINERS: &[&str] = &["jpg", "jpeg", "png", "webp", "tif", "tiff"];

/// Read capture metadata from an image file.
///
/// Formats without an EXIF container (GIF, BMP) and files without an EXIF
/// block yield the default (empty) metadata. A present but unparseable block
/// is reported as [`BackendError::Metadata`].
pub fn read_capture_metadata(path: &Path) -> Result<CaptureMetadata, BackendError> {
    let has_container = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| EXIF_CONTAINERS.contains(&e.to_ascii_lowercase().as_str()));
    if !has_container {
        return Ok(CaptureMetadata::default());
    }

    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let exif = match exif::Reader::new().read_from_container(&mut reader) {
        Ok(exif) => exif,
        Err(exif::Error::NotFound(_)) => return Ok(CaptureMetadata::default()),
        Err(e) => {
            return Err(BackendError::Metadata(format!(
                "{}: {}",
                path.display(),
                e
            )));
        }
    };

    Ok(CaptureMetadata {
        make: ascii_field(&exif, Tag::Make),
        model: ascii_field(&exif, Tag::Model),
        exposure_time: rational_field(&exif, Tag::ExposureTime),
        f_number: rational_field(&exif, Tag::FNumber),
        iso: exif
            .get_field(Tag::PhotographicSensitivity, In::PRIMARY)
            .and_then(|f| f.value.get_uint(0)),
        focal_length: rational_field(&exif, Tag::FocalLength),
        lens: ascii_field(&exif, Tag::LensModel),
        captured_at: datetime_field(&exif, Tag::DateTimeOriginal)
            .or_else(|| datetime_field(&exif, Tag::DateTime)),
        gps: gps_position(&exif),
    })
}

fn ascii_field(exif: &Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match &field.value {
        Value::Ascii(parts) => {
            let raw = parts.first()?;
            let text = String::from_utf8_lossy(raw)
                .trim_matches(char::from(0))
                .trim()
                .to_string();
            (!text.is_empty()).then_some(text)
        }
        _ => None,
    }
}

fn rational_field(exif: &Exif, tag: Tag) -> Option<f64> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match &field.value {
        Value::Rational(v) => v
            .first()
            .filter(|r| r.denom != 0)
            .map(|r| r.num as f64 / r.denom as f64),
        _ => None,
    }
}

/// EXIF timestamps carry no zone unless an offset tag is present; they are
/// read as UTC.
fn datetime_field(exif: &Exif, tag: Tag) -> Option<DateTime<Utc>> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    let raw = match &field.value {
        Value::Ascii(parts) => parts.first()?,
        _ => return None,
    };
    let dt = exif::DateTime::from_ascii(raw).ok()?;
    let naive = NaiveDate::from_ymd_opt(dt.year as i32, dt.month as u32, dt.day as u32)?
        .and_hms_opt(dt.hour as u32, dt.minute as u32, dt.second as u32)?;
    Some(naive.and_utc())
}

fn gps_position(exif: &Exif) -> Option<GpsPosition> {
    let latitude = gps_coordinate(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, 'S')?;
    let longitude = gps_coordinate(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, 'W')?;
    Some(GpsPosition {
        latitude,
        longitude,
    })
}

fn gps_coordinate(exif: &Exif, tag: Tag, ref_tag: Tag, negative: char) -> Option<f64> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    let Value::Rational(parts) = &field.value else {
        return None;
    };
    if parts.len() < 3 || parts.iter().take(3).any(|r| r.denom == 0) {
        return None;
    }
    let value = dms_to_decimal(
        parts[0].num as f64 / parts[0].denom as f64,
        parts[1].num as f64 / parts[1].denom as f64,
        parts[2].num as f64 / parts[2].denom as f64,
    );
    let hemisphere = ascii_field(exif, ref_tag).unwrap_or_default();
    Some(if hemisphere.contains(negative) {
        -value
    } else {
        value
    })
}

fn dms_to_decimal(degrees: f64, minutes: f64, seconds: f64) -> f64 {
    degrees + minutes / 60.0 + seconds / 3600.0
}
