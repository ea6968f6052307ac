//! Timestamp Resolver
//!
//! Embedded "original capture" time first, file modification time second.
//! Metadata problems never fail the batch; they only move a file to the
//! fallback.

use crate::error::MetadataError;
use chrono::{DateTime, FixedOffset, Local, NaiveDate, TimeZone, Utc};
use exif::{In, Tag, Value};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

/// Source of an embedded capture time, in epoch milliseconds.
pub trait CaptureTimeSource: Send + Sync {
    /// `Ok(None)` when the file simply carries no capture time.
    fn capture_time(&self, path: &Path) -> Result<Option<i64>, MetadataError>;
}

/// Reads `DateTimeOriginal` (and `OffsetTimeOriginal`) from EXIF.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExifCaptureTime;

impl CaptureTimeSource for ExifCaptureTime {
    fn capture_time(&self, path: &Path) -> Result<Option<i64>, MetadataError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let exif = match exif::Reader::new().read_from_container(&mut reader) {
            Ok(exif) => exif,
            Err(exif::Error::NotFound(_)) => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let Some(field) = exif.get_field(Tag::DateTimeOriginal, In::PRIMARY) else {
            return Ok(None);
        };
        let Some(date) = first_ascii(&field.value) else {
            return Ok(None);
        };
        let offset = exif
            .get_field(Tag::OffsetTimeOriginal, In::PRIMARY)
            .and_then(|f| first_ascii(&f.value));

        parse_exif_datetime(date, offset).map(Some)
    }
}

fn first_ascii(value: &Value) -> Option<&[u8]> {
    match value {
        Value::Ascii(parts) => parts.first().map(Vec::as_slice),
        _ => None,
    }
}

/// Convert an EXIF `YYYY:MM:DD HH:MM:SS` value to epoch milliseconds.
///
/// With an `offset` (`+HH:MM`) the time is absolute; without one it is taken
/// as local wall-clock time, as cameras write it.
pub fn parse_exif_datetime(date: &[u8], offset: Option<&[u8]>) -> Result<i64, MetadataError> {
    let invalid = || MetadataError::InvalidDate(String::from_utf8_lossy(date).into_owned());

    let mut dt = exif::DateTime::from_ascii(date).map_err(|_| invalid())?;
    if let Some(offset) = offset {
        // Unparseable offsets are ignored rather than discarding the date.
        let _ = dt.parse_offset(offset);
    }

    let naive = NaiveDate::from_ymd_opt(dt.year as i32, dt.month as u32, dt.day as u32)
        .and_then(|d| {
            d.and_hms_nano_opt(
                dt.hour as u32,
                dt.minute as u32,
                dt.second as u32,
                dt.nanosecond.unwrap_or(0),
            )
        })
        .ok_or_else(invalid)?;

    let instant = match dt.offset {
        Some(minutes) => FixedOffset::east_opt(minutes as i32 * 60)
            .and_then(|tz| tz.from_local_datetime(&naive).single())
            .map(|t| t.timestamp_millis()),
        None => Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|t| t.timestamp_millis()),
    };
    instant.ok_or_else(invalid)
}

/// Last-modified time of `path` in epoch milliseconds.
pub fn modified_millis(path: &Path) -> std::io::Result<i64> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(DateTime::<Utc>::from(modified).timestamp_millis())
}

/// Resolves a capture timestamp with metadata-then-mtime precedence.
#[derive(Clone)]
pub struct TimestampResolver {
    source: Arc<dyn CaptureTimeSource>,
}

impl Default for TimestampResolver {
    fn default() -> Self {
        Self::new(Arc::new(ExifCaptureTime))
    }
}

/// Where a resolved timestamp came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampOrigin {
    /// Embedded capture metadata.
    Embedded,
    /// Filesystem modification time.
    Modified,
    /// Neither was available; the value is 0.
    Missing,
}

impl TimestampResolver {
    /// Resolver using a custom metadata source.
    pub fn new(source: Arc<dyn CaptureTimeSource>) -> Self {
        Self { source }
    }

    /// Capture time in epoch milliseconds. Never fails.
    pub fn resolve(&self, path: &Path) -> i64 {
        self.resolve_with_origin(path).0
    }

    /// Capture time and where it came from.
    pub fn resolve_with_origin(&self, path: &Path) -> (i64, TimestampOrigin) {
        match self.source.capture_time(path) {
            Ok(Some(ts)) => return (ts, TimestampOrigin::Embedded),
            Ok(None) => {}
            Err(err) => log::debug!("{}: metadata unreadable ({err}), using mtime", path.display()),
        }

        match modified_millis(path) {
            Ok(ts) => (ts, TimestampOrigin::Modified),
            Err(err) => {
                log::warn!("{}: no modification time ({err})", path.display());
                (0, TimestampOrigin::Missing)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    static TEMP_FILE_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn write_temp_file(bytes: &[u8], mtime_ms: u64) -> PathBuf {
        let mut path = std::env::temp_dir();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock before UNIX epoch")
            .as_nanos();
        let sequence = TEMP_FILE_COUNTER.fetch_add(1, Ordering::Relaxed);
        path.push(format!("qr_intake_ts_{nanos}_{sequence}.jpg"));
        fs::write(&path, bytes).expect("failed to write temp file");
        let file = File::options().write(true).open(&path).unwrap();
        file.set_modified(UNIX_EPOCH + Duration::from_millis(mtime_ms))
            .unwrap();
        path
    }

    struct Fixed(Result<Option<i64>, ()>);

    impl CaptureTimeSource for Fixed {
        fn capture_time(&self, _path: &Path) -> Result<Option<i64>, MetadataError> {
            match self.0 {
                Ok(v) => Ok(v),
                Err(()) => Err(MetadataError::InvalidDate("boom".into())),
            }
        }
    }

    #[test]
    fn test_offset_datetime_is_absolute() {
        let ts = parse_exif_datetime(b"2024:05:01 10:00:00", Some(b"+02:00")).unwrap();
        assert_eq!(ts, 1_714_550_400_000);
    }

    #[test]
    fn test_naive_datetime_uses_local_zone() {
        let ts = parse_exif_datetime(b"2024:05:01 10:00:00", None).unwrap();
        let expected = Local
            .with_ymd_and_hms(2024, 5, 1, 10, 0, 0)
            .earliest()
            .unwrap()
            .timestamp_millis();
        assert_eq!(ts, expected);
    }

    #[test]
    fn test_garbage_date_is_error() {
        assert!(parse_exif_datetime(b"not a date", None).is_err());
        assert!(parse_exif_datetime(b"2024:13:45 10:00:00", None).is_err());
    }

    #[test]
    fn test_embedded_time_wins() {
        let path = write_temp_file(b"x", 5_000);
        let resolver = TimestampResolver::new(Arc::new(Fixed(Ok(Some(42)))));
        assert_eq!(resolver.resolve_with_origin(&path), (42, TimestampOrigin::Embedded));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_metadata_error_falls_back_to_mtime() {
        let path = write_temp_file(b"x", 5_000);
        let resolver = TimestampResolver::new(Arc::new(Fixed(Err(()))));
        assert_eq!(resolver.resolve_with_origin(&path), (5_000, TimestampOrigin::Modified));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_exif_absent_falls_back_to_mtime() {
        let path = write_temp_file(b"definitely not a jpeg", 7_000);
        let resolver = TimestampResolver::default();
        assert_eq!(resolver.resolve(&path), 7_000);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_missing_file_resolves_to_zero() {
        let resolver = TimestampResolver::default();
        let path = std::env::temp_dir().join("qr_intake_ts_missing_file.jpg");
        assert_eq!(resolver.resolve_with_origin(&path), (0, TimestampOrigin::Missing));
    }
}
