//! Upload Coordinator
//!
//! Pushes finalized groups to a storage backend one image at a time. Each
//! submission issues exactly one upload per image and reports every outcome;
//! nothing is retried here. Re-submitting failures is the caller's call.

use crate::config::UploadConfig;
use crate::error::UploadError;
use crate::grouping::group_records;
use crate::models::{Group, ImageRecord, Subject};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Folder used by [`DirectoryStore`] for photos with no subject.
pub const PENDING_FOLDER: &str = "_pending";

/// Where an upload landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReceipt {
    /// Backend identifier of the stored object.
    pub storage_id: String,
    /// Location the object can be fetched from.
    pub storage_url: String,
}

/// Storage backend.
pub trait UploadSink: Send + Sync {
    /// Store one image. `subject_id = None` marks it unassigned, pending
    /// manual triage.
    fn upload(
        &self,
        bytes: &[u8],
        file_name: &str,
        subject_id: Option<&str>,
    ) -> Result<UploadReceipt, UploadError>;
}

/// Result of uploading a single record.
#[derive(Debug)]
pub struct UploadOutcome {
    /// Source file of the record.
    pub source: PathBuf,
    /// Position of the record in the scanned selection.
    pub position: usize,
    /// Receipt or failure.
    pub result: Result<UploadReceipt, UploadError>,
}

impl UploadOutcome {
    /// Whether the backend accepted the image.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcomes of one group submission.
#[derive(Debug)]
pub struct GroupSubmission {
    /// Label of the submitted group.
    pub subject: String,
    /// Attendee key sent with every upload of the group.
    pub attendee_id: Option<String>,
    /// One entry per uploaded record, in group order.
    pub outcomes: Vec<UploadOutcome>,
}

impl GroupSubmission {
    /// Number of accepted uploads.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Outcomes the caller may want to re-submit.
    pub fn failures(&self) -> impl Iterator<Item = &UploadOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

/// Drives an [`UploadSink`] with grouped records.
pub struct UploadCoordinator<S> {
    sink: S,
    config: UploadConfig,
}

impl<S: UploadSink> UploadCoordinator<S> {
    /// Coordinator with default options.
    pub fn new(sink: S) -> Self {
        Self::with_config(sink, UploadConfig::default())
    }

    /// Coordinator with explicit options.
    pub fn with_config(sink: S, config: UploadConfig) -> Self {
        Self { sink, config }
    }

    /// Underlying backend.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Upload every member of `group` once, plus the anchor when
    /// `upload_separators` is set. Unknown groups upload unassigned.
    pub fn submit_group(&self, group: &Group) -> GroupSubmission {
        let subject = group.subject();
        let records: Vec<&ImageRecord> = if self.config.upload_separators {
            group.records().collect()
        } else {
            group.members().iter().collect()
        };

        let outcomes = self.submit_records(records, subject.attendee_id());
        let submission = GroupSubmission {
            subject: subject.label().to_string(),
            attendee_id: subject.attendee_id().map(str::to_string),
            outcomes,
        };

        let failed = submission.outcomes.len() - submission.succeeded();
        if failed > 0 {
            log::warn!(
                "group '{}': {} uploaded, {failed} failed",
                submission.subject,
                submission.succeeded()
            );
        } else {
            log::info!(
                "group '{}': {} uploaded",
                submission.subject,
                submission.succeeded()
            );
        }
        submission
    }

    /// Upload `records` under an explicit subject, e.g. after manual triage.
    pub fn submit_records<'a, I>(&self, records: I, subject_id: Option<&str>) -> Vec<UploadOutcome>
    where
        I: IntoIterator<Item = &'a ImageRecord>,
    {
        records
            .into_iter()
            .map(|record| UploadOutcome {
                source: record.source().to_path_buf(),
                position: record.position(),
                result: self.upload_one(record, subject_id),
            })
            .collect()
    }

    fn upload_one(
        &self,
        record: &ImageRecord,
        subject_id: Option<&str>,
    ) -> Result<UploadReceipt, UploadError> {
        let bytes = fs::read(record.source()).map_err(|source| UploadError::Source {
            path: record.source().to_path_buf(),
            source,
        })?;
        let result = self.sink.upload(&bytes, &record.file_name(), subject_id);
        match &result {
            Ok(receipt) => log::debug!("{} -> {}", record.source().display(), receipt.storage_id),
            Err(err) => log::warn!("{}: upload failed ({err})", record.source().display()),
        }
        result
    }
}

/// Filesystem-backed sink: one subfolder per subject, [`PENDING_FOLDER`]
/// for unassigned photos. Existing files are never overwritten.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Store rooted at `root`. The folder is created on first upload.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root folder.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn folder_for(&self, subject_id: Option<&str>) -> PathBuf {
        match subject_id {
            Some(id) => self.root.join(sanitize_component(id)),
            None => self.root.join(PENDING_FOLDER),
        }
    }
}

fn sanitize_component(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim().to_string();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        cleaned
    }
}

fn free_name(folder: &Path, file_name: &str) -> PathBuf {
    let candidate = folder.join(file_name);
    if !candidate.exists() {
        return candidate;
    }
    let name = Path::new(file_name);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = name
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (1..)
        .map(|n| folder.join(format!("{stem}-{n}{ext}")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

impl UploadSink for DirectoryStore {
    fn upload(
        &self,
        bytes: &[u8],
        file_name: &str,
        subject_id: Option<&str>,
    ) -> Result<UploadReceipt, UploadError> {
        let file_name = sanitize_component(file_name);
        let folder = self.folder_for(subject_id);
        fs::create_dir_all(&folder)?;

        let target = free_name(&folder, &file_name);
        let staging = folder.join(format!(".{file_name}.part"));
        fs::write(&staging, bytes)?;
        fs::rename(&staging, &target)?;

        let storage_id = target
            .strip_prefix(&self.root)
            .unwrap_or(&target)
            .to_string_lossy()
            .replace('\\', "/");
        let absolute = fs::canonicalize(&target).unwrap_or_else(|_| target.clone());
        Ok(UploadReceipt {
            storage_id,
            storage_url: format!("file://{}", absolute.display()),
        })
    }
}

/// Scanned records awaiting upload.
///
/// Owned by the orchestrating thread. Successful uploads are evicted and
/// their previews released; failures stay staged for re-submission.
#[derive(Debug, Default)]
pub struct StagingArea {
    records: Vec<ImageRecord>,
}

impl StagingArea {
    /// Empty staging set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add records, keeping capture order.
    pub fn stage<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = ImageRecord>,
    {
        self.records.extend(records);
        self.records.sort_by_key(ImageRecord::capture_timestamp);
    }

    /// Staged records in capture order.
    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    /// Number of staged records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Current grouping of the staged records.
    pub fn groups(&self) -> Vec<Group> {
        group_records(self.records.iter().cloned())
    }

    /// Drop records whose upload succeeded. Returns how many were evicted.
    pub fn evict_uploaded(&mut self, outcomes: &[UploadOutcome]) -> usize {
        let before = self.records.len();
        self.records.retain_mut(|record| {
            let uploaded = outcomes.iter().any(|o| {
                o.is_success() && o.position == record.position() && o.source == record.source()
            });
            if uploaded {
                record.release_preview();
            }
            !uploaded
        });
        before - self.records.len()
    }

    /// Remove one record without uploading it, e.g. a separator anchor.
    /// Returns whether it was staged.
    pub fn discard(&mut self, record: &ImageRecord) -> bool {
        let before = self.records.len();
        self.records
            .retain(|r| !(r.position() == record.position() && r.source() == record.source()));
        before != self.records.len()
    }
}

/// Subject label for a group, as shown to operators.
pub fn describe_subject(subject: &Subject) -> String {
    match subject.attendee_id() {
        Some(id) if id != subject.label() => format!("{} ({id})", subject.label()),
        _ => subject.label().to_string(),
    }
}
