//! Batch Scanner
//!
//! Scans a file selection in fixed-size chunks: the files of one chunk are
//! decoded concurrently on a pool exactly as wide as the chunk, and the next
//! chunk starts only when every member has finished. The collected records
//! are then stably sorted by capture time.

use crate::config::ScanConfig;
use crate::decoder::{Detection, QrDecoder, Strategy};
use crate::error::IntakeError;
use crate::grouping::group_records;
use crate::models::{Group, ImageRecord, PreviewHandle, SeparatorToken};
use crate::progress::{CancelToken, ProgressSink, ScanEvent};
use crate::timestamp::{TimestampOrigin, TimestampResolver, modified_millis};
use crate::tools::{collect_selection, load_rgb};
use crate::utils::resample::thumbnail;
use rayon::prelude::*;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-batch counters.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanTelemetry {
    /// Files scanned.
    pub files: usize,
    /// Files on which a separator was found.
    pub separators: usize,
    /// Separators found by the native detector.
    pub native_hits: usize,
    /// Separators found on the resampled raster.
    pub resampled_hits: usize,
    /// Separators found after the contrast boost.
    pub contrast_hits: usize,
    /// Separators found at native resolution.
    pub full_resolution_hits: usize,
    /// Files whose pixels could not be decoded.
    pub raster_failures: usize,
    /// Files timed by modification time instead of embedded metadata.
    pub metadata_fallbacks: usize,
    /// Files with no usable timestamp at all.
    pub missing_timestamps: usize,
}

impl ScanTelemetry {
    /// Number of separators a given rung produced.
    pub fn hits(&self, strategy: Strategy) -> usize {
        match strategy {
            Strategy::Native => self.native_hits,
            Strategy::Resampled => self.resampled_hits,
            Strategy::EnhancedContrast => self.contrast_hits,
            Strategy::FullResolution => self.full_resolution_hits,
        }
    }

    fn absorb(&mut self, scan: &FileScan) {
        self.files += 1;
        if let Some(strategy) = scan.strategy {
            self.separators += 1;
            match strategy {
                Strategy::Native => self.native_hits += 1,
                Strategy::Resampled => self.resampled_hits += 1,
                Strategy::EnhancedContrast => self.contrast_hits += 1,
                Strategy::FullResolution => self.full_resolution_hits += 1,
            }
        }
        if !scan.raster_ok {
            self.raster_failures += 1;
        }
        match scan.origin {
            TimestampOrigin::Embedded => {}
            TimestampOrigin::Modified => self.metadata_fallbacks += 1,
            TimestampOrigin::Missing => self.missing_timestamps += 1,
        }
    }
}

/// Result of scanning a selection.
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// One record per input file, ascending by capture time.
    pub records: Vec<ImageRecord>,
    /// Batch counters.
    pub telemetry: ScanTelemetry,
    /// Wall time of the batch.
    pub elapsed: Duration,
}

impl ScanReport {
    /// Partition the records into groups.
    pub fn into_groups(self) -> Vec<Group> {
        group_records(self.records)
    }
}

struct FileScan {
    record: ImageRecord,
    strategy: Option<Strategy>,
    raster_ok: bool,
    origin: TimestampOrigin,
}

/// Chunked, bounded-concurrency scanner.
pub struct BatchScanner {
    config: ScanConfig,
    decoder: QrDecoder,
    resolver: TimestampResolver,
    progress: Option<Arc<dyn ProgressSink>>,
    cancel: Option<CancelToken>,
    pool: rayon::ThreadPool,
}

impl BatchScanner {
    /// Scanner with the default decoder ladder and EXIF resolver.
    pub fn new(config: ScanConfig) -> Result<Self, IntakeError> {
        let config = config.validated();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.chunk_size)
            .thread_name(|i| format!("qr-intake-scan-{i}"))
            .build()?;
        Ok(Self {
            decoder: QrDecoder::new(&config),
            resolver: TimestampResolver::default(),
            progress: None,
            cancel: None,
            pool,
            config,
        })
    }

    /// Replace the QR decoder.
    pub fn with_decoder(mut self, decoder: QrDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    /// Replace the timestamp resolver.
    pub fn with_resolver(mut self, resolver: TimestampResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Report progress to `sink`.
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Stop at the next chunk boundary once `token` is cancelled.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Enumerate `roots` (files or folders) and scan the result.
    pub fn scan_paths(&self, roots: &[PathBuf]) -> Result<ScanReport, IntakeError> {
        let files = collect_selection(roots)?;
        self.scan(&files)
    }

    /// Scan `files`, returning exactly one record per file.
    ///
    /// Per-file failures degrade the record (no separator, fallback
    /// timestamp, no preview). The only error is cancellation.
    pub fn scan(&self, files: &[PathBuf]) -> Result<ScanReport, IntakeError> {
        let start = Instant::now();
        let total = files.len();
        let chunk_size = self.config.chunk_size;
        let mut records = Vec::with_capacity(total);
        let mut telemetry = ScanTelemetry::default();

        self.emit(ScanEvent::Started { total });

        for (chunk_idx, chunk) in files.chunks(chunk_size).enumerate() {
            if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                log::info!("scan cancelled at {}/{}", records.len(), total);
                return Err(IntakeError::Cancelled {
                    completed: records.len(),
                    total,
                });
            }

            let base = chunk_idx * chunk_size;
            let scanned: Vec<FileScan> = self.pool.install(|| {
                chunk
                    .par_iter()
                    .enumerate()
                    .map(|(i, path)| self.scan_file_guarded(path, base + i))
                    .collect()
            });

            for scan in scanned {
                telemetry.absorb(&scan);
                records.push(scan.record);
            }

            self.emit(ScanEvent::ChunkCompleted {
                processed: records.len(),
                total,
                separators: telemetry.separators,
            });
            std::thread::yield_now();
        }

        records.sort_by_key(ImageRecord::capture_timestamp);

        let elapsed = start.elapsed();
        self.emit(ScanEvent::Finished {
            processed: records.len(),
            elapsed,
        });

        Ok(ScanReport {
            records,
            telemetry,
            elapsed,
        })
    }

    fn emit(&self, event: ScanEvent) {
        if let Some(sink) = &self.progress {
            sink.on_event(event);
        }
    }

    /// Scan one file; a panic anywhere in metadata, raster or decode work
    /// degrades to a bare record timed by mtime.
    fn scan_file_guarded(&self, path: &Path, position: usize) -> FileScan {
        match catch_unwind(AssertUnwindSafe(|| self.scan_file(path, position))) {
            Ok(scan) => scan,
            Err(_) => {
                log::warn!("{}: scan panicked, keeping a bare record", path.display());
                let (capture_timestamp, origin) = match modified_millis(path) {
                    Ok(ts) => (ts, TimestampOrigin::Modified),
                    Err(_) => (0, TimestampOrigin::Missing),
                };
                FileScan {
                    record: ImageRecord::new(
                        path.to_path_buf(),
                        position,
                        capture_timestamp,
                        None,
                        None,
                    ),
                    strategy: None,
                    raster_ok: false,
                    origin,
                }
            }
        }
    }

    fn scan_file(&self, path: &Path, position: usize) -> FileScan {
        let ((capture_timestamp, origin), pixels) = rayon::join(
            || self.resolver.resolve_with_origin(path),
            || self.read_pixels(path),
        );

        let (separator, strategy, preview, raster_ok) = match pixels {
            Some((Some(hit), preview)) => {
                log::debug!("{}: separator via {} strategy", path.display(), hit.strategy);
                (
                    Some(SeparatorToken::parse(&hit.payload)),
                    Some(hit.strategy),
                    Some(preview),
                    true,
                )
            }
            Some((None, preview)) => (None, None, Some(preview), true),
            None => (None, None, None, false),
        };

        FileScan {
            record: ImageRecord::new(
                path.to_path_buf(),
                position,
                capture_timestamp,
                separator,
                preview,
            ),
            strategy,
            raster_ok,
            origin,
        }
    }

    fn read_pixels(&self, path: &Path) -> Option<(Option<Detection>, PreviewHandle)> {
        let raster = match load_rgb(path) {
            Ok(raster) => raster,
            Err(err) => {
                log::warn!("{}: cannot decode pixels ({err})", path.display());
                return None;
            }
        };

        let preview = PreviewHandle::new(thumbnail(&raster, self.config.preview_edge));
        let detection = match catch_unwind(AssertUnwindSafe(|| self.decoder.decode(&raster))) {
            Ok(detection) => detection,
            Err(_) => {
                log::warn!("{}: QR decoder panicked, treating as plain photo", path.display());
                None
            }
        };
        Some((detection, preview))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::SoftwareDecoder;
    use crate::error::MetadataError;
    use crate::timestamp::CaptureTimeSource;
    use image::{GrayImage, Rgb, RgbImage};
    use std::collections::HashMap;
    use std::fs;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    static TEMP_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_dir() -> PathBuf {
        let mut path = std::env::temp_dir();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock before UNIX epoch")
            .as_nanos();
        let sequence = TEMP_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        path.push(format!("qr_intake_pipeline_{nanos}_{sequence}"));
        fs::create_dir_all(&path).expect("failed to create temp dir");
        path
    }

    /// Mid-gray images read as separators in either polarity; white ones never do.
    struct GrayIsSeparator;

    impl SoftwareDecoder for GrayIsSeparator {
        fn decode(&self, luma: &GrayImage) -> Option<String> {
            (100..=160)
                .contains(&luma.get_pixel(0, 0)[0])
                .then(|| r#"{"id":"A","name":"Alice"}"#.to_string())
        }
    }

    /// Capture times keyed by file name; named files fail.
    struct Scripted {
        times: HashMap<String, i64>,
        failing: Vec<String>,
        in_flight: AtomicUsize,
        peak: Mutex<usize>,
    }

    impl CaptureTimeSource for Scripted {
        fn capture_time(&self, path: &Path) -> Result<Option<i64>, MetadataError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            {
                let mut peak = self.peak.lock().unwrap();
                *peak = (*peak).max(now);
            }
            std::thread::sleep(Duration::from_millis(5));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            if self.failing.contains(&name) {
                return Err(MetadataError::InvalidDate("corrupt".into()));
            }
            Ok(self.times.get(&name).copied())
        }
    }

    /// Panics while reading metadata of one named file.
    struct PanicsOn(&'static str);

    impl CaptureTimeSource for PanicsOn {
        fn capture_time(&self, path: &Path) -> Result<Option<i64>, MetadataError> {
            if path.ends_with(self.0) {
                panic!("corrupt maker notes");
            }
            Ok(None)
        }
    }

    fn write_png(dir: &Path, name: &str, marked: bool, mtime_ms: u64) -> PathBuf {
        let path = dir.join(name);
        let value = if marked { 128 } else { 255 };
        RgbImage::from_pixel(16, 16, Rgb([value, value, value]))
            .save(&path)
            .unwrap();
        let file = fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(UNIX_EPOCH + Duration::from_millis(mtime_ms))
            .unwrap();
        path
    }

    fn scanner(source: Arc<Scripted>) -> BatchScanner {
        let config = ScanConfig::default();
        let decoder = QrDecoder::new(&config).with_software(Arc::new(GrayIsSeparator));
        BatchScanner::new(config)
            .unwrap()
            .with_decoder(decoder)
            .with_resolver(TimestampResolver::new(source))
    }

    fn scripted(times: &[(&str, i64)], failing: &[&str]) -> Arc<Scripted> {
        Arc::new(Scripted {
            times: times.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            failing: failing.iter().map(|s| s.to_string()).collect(),
            in_flight: AtomicUsize::new(0),
            peak: Mutex::new(0),
        })
    }

    #[test]
    fn test_one_record_per_file_sorted_by_time() {
        let dir = temp_dir();
        let files = vec![
            write_png(&dir, "t3.png", false, 1),
            write_png(&dir, "t1.png", true, 1),
            write_png(&dir, "t2.png", false, 1),
            write_png(&dir, "t5.png", false, 1),
            write_png(&dir, "t4.png", false, 1),
        ];
        let source = scripted(
            &[("t1.png", 100), ("t2.png", 200), ("t3.png", 300), ("t4.png", 400), ("t5.png", 500)],
            &[],
        );
        let report = scanner(source).scan(&files).unwrap();

        assert_eq!(report.records.len(), 5);
        let stamps: Vec<i64> = report.records.iter().map(|r| r.capture_timestamp()).collect();
        assert_eq!(stamps, vec![100, 200, 300, 400, 500]);
        let mut positions: Vec<usize> = report.records.iter().map(|r| r.position()).collect();
        positions.sort();
        assert_eq!(positions, vec![0, 1, 2, 3, 4]);
        assert!(report.records[0].is_separator());
        assert_eq!(report.telemetry.separators, 1);
        assert_eq!(report.telemetry.resampled_hits, 1);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_metadata_failure_falls_back_to_mtime() {
        let dir = temp_dir();
        let files = vec![
            write_png(&dir, "a.png", false, 1_000),
            write_png(&dir, "b.png", false, 2_000),
            write_png(&dir, "c.png", false, 3_000),
        ];
        let source = scripted(&[("a.png", 10), ("c.png", 30)], &["b.png"]);
        let report = scanner(source).scan(&files).unwrap();

        assert_eq!(report.records.len(), 3);
        let b = report
            .records
            .iter()
            .find(|r| r.file_name() == "b.png")
            .unwrap();
        assert_eq!(b.capture_timestamp(), 2_000);
        assert_eq!(report.telemetry.metadata_fallbacks, 1);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_ties_keep_submission_order() {
        let dir = temp_dir();
        let files: Vec<PathBuf> = (0..7)
            .map(|i| write_png(&dir, &format!("f{i}.png"), false, 42))
            .collect();
        let source = scripted(&[], &[]);
        let report = scanner(source).scan(&files).unwrap();
        let positions: Vec<usize> = report.records.iter().map(|r| r.position()).collect();
        assert_eq!(positions, (0..7).collect::<Vec<_>>());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_concurrency_bounded_by_chunk_size() {
        let dir = temp_dir();
        let files: Vec<PathBuf> = (0..9)
            .map(|i| write_png(&dir, &format!("f{i}.png"), false, 1))
            .collect();
        let source = scripted(&[], &[]);
        scanner(source.clone()).scan(&files).unwrap();
        assert!(*source.peak.lock().unwrap() <= 3);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_undecodable_file_still_produces_record() {
        let dir = temp_dir();
        let broken = dir.join("broken.jpg");
        fs::write(&broken, b"not a jpeg").unwrap();
        let good = write_png(&dir, "good.png", false, 5);
        let source = scripted(&[], &[]);
        let report = scanner(source).scan(&[broken, good]).unwrap();

        assert_eq!(report.records.len(), 2);
        let broken = report.records.iter().find(|r| r.position() == 0).unwrap();
        assert!(!broken.is_separator());
        assert!(broken.preview().is_none());
        assert_eq!(report.telemetry.raster_failures, 1);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_previews_are_handed_to_caller() {
        let dir = temp_dir();
        let files = vec![write_png(&dir, "a.png", false, 1)];
        let source = scripted(&[], &[]);
        let mut report = scanner(source).scan(&files).unwrap();
        let record = &mut report.records[0];
        assert_eq!(record.preview().unwrap().holders(), 1);
        assert!(record.release_preview());
        assert!(record.preview().is_none());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_progress_events_per_chunk() {
        let dir = temp_dir();
        let files: Vec<PathBuf> = (0..7)
            .map(|i| write_png(&dir, &format!("f{i}.png"), false, 1))
            .collect();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let events = events.clone();
            move |event: ScanEvent| events.lock().unwrap().push(event)
        };
        scanner(scripted(&[], &[]))
            .with_progress(Arc::new(sink))
            .scan(&files)
            .unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.first(), Some(&ScanEvent::Started { total: 7 }));
        let processed: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                ScanEvent::ChunkCompleted { processed, .. } => Some(*processed),
                _ => None,
            })
            .collect();
        assert_eq!(processed, vec![3, 6, 7]);
        assert!(matches!(events.last(), Some(ScanEvent::Finished { processed: 7, .. })));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_cancel_before_start() {
        let dir = temp_dir();
        let files = vec![write_png(&dir, "a.png", false, 1)];
        let token = CancelToken::new();
        token.cancel();
        let result = scanner(scripted(&[], &[])).with_cancel(token).scan(&files);
        assert!(matches!(
            result,
            Err(IntakeError::Cancelled { completed: 0, total: 1 })
        ));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_empty_selection() {
        let report = scanner(scripted(&[], &[])).scan(&[]).unwrap();
        assert!(report.records.is_empty());
        assert_eq!(report.telemetry, ScanTelemetry::default());
    }

    #[test]
    fn test_panicking_file_still_produces_record() {
        let dir = temp_dir();
        let files = vec![
            write_png(&dir, "a.png", false, 1_000),
            write_png(&dir, "boom.png", true, 2_000),
            write_png(&dir, "c.png", false, 3_000),
        ];
        let config = ScanConfig::default();
        let decoder = QrDecoder::new(&config).with_software(Arc::new(GrayIsSeparator));
        let report = BatchScanner::new(config)
            .unwrap()
            .with_decoder(decoder)
            .with_resolver(TimestampResolver::new(Arc::new(PanicsOn("boom.png"))))
            .scan(&files)
            .unwrap();

        assert_eq!(report.records.len(), 3);
        let boom = &report.records[1];
        assert_eq!(boom.file_name(), "boom.png");
        assert_eq!(boom.capture_timestamp(), 2_000);
        assert!(!boom.is_separator());
        assert!(boom.preview().is_none());
        assert_eq!(report.telemetry.raster_failures, 1);
        let _ = fs::remove_dir_all(dir);
    }
}
