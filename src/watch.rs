//! Hot-folder intake.
//!
//! New files are held for a buffer period before they are forwarded, so a
//! photographer can still delete or replace a shot. A file removed during
//! its buffer is never forwarded.

use crate::progress::CancelToken;
use crate::tools::is_supported_image;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Time a new file waits before it is forwarded.
pub const DEFAULT_BUFFER: Duration = Duration::from_secs(30);
/// Directory listing interval used by [`HotFolder::run`].
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Pending deadlines keyed by file name.
#[derive(Debug, Clone)]
pub struct DebounceTable {
    buffer: Duration,
    pending: HashMap<String, Instant>,
}

impl Default for DebounceTable {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER)
    }
}

impl DebounceTable {
    /// Table that releases names `buffer` after they were first seen.
    pub fn new(buffer: Duration) -> Self {
        Self {
            buffer,
            pending: HashMap::new(),
        }
    }

    /// Configured buffer.
    pub fn buffer(&self) -> Duration {
        self.buffer
    }

    /// Start the buffer for `name`. A name already pending keeps its
    /// original deadline; returns `false` in that case.
    pub fn track(&mut self, name: &str, now: Instant) -> bool {
        if self.pending.contains_key(name) {
            return false;
        }
        self.pending.insert(name.to_string(), now + self.buffer);
        true
    }

    /// Forget `name`, e.g. because the file was deleted. Returns whether it
    /// was pending.
    pub fn cancel(&mut self, name: &str) -> bool {
        self.pending.remove(name).is_some()
    }

    /// Whether `name` is waiting out its buffer.
    pub fn is_tracked(&self, name: &str) -> bool {
        self.pending.contains_key(name)
    }

    /// Number of pending names.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    /// Remove and return every name whose deadline is at or before `now`,
    /// oldest deadline first.
    pub fn drain_due(&mut self, now: Instant) -> Vec<String> {
        let mut due: Vec<(Instant, String)> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(name, deadline)| (*deadline, name.clone()))
            .collect();
        due.sort();
        for (_, name) in &due {
            self.pending.remove(name);
        }
        due.into_iter().map(|(_, name)| name).collect()
    }
}

/// Polling watcher over one directory, driving a [`DebounceTable`].
#[derive(Debug)]
pub struct HotFolder {
    dir: PathBuf,
    table: DebounceTable,
    seen: HashSet<String>,
}

impl HotFolder {
    /// Watch `dir` with the given buffer. Files already present count as
    /// new on the first poll.
    pub fn new(dir: impl Into<PathBuf>, buffer: Duration) -> Self {
        Self {
            dir: dir.into(),
            table: DebounceTable::new(buffer),
            seen: HashSet::new(),
        }
    }

    /// Watched directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Files still inside their buffer.
    pub fn pending(&self) -> usize {
        self.table.len()
    }

    fn listing(&self) -> io::Result<HashSet<String>> {
        let mut names = HashSet::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !entry.file_type()?.is_file() {
                continue;
            }
            if is_supported_image(Path::new(&name)) {
                names.insert(name);
            }
        }
        Ok(names)
    }

    /// Diff the directory against the last listing and return files whose
    /// buffer has elapsed by `now`.
    pub fn poll(&mut self, now: Instant) -> io::Result<Vec<PathBuf>> {
        let listing = self.listing()?;

        for name in listing.difference(&self.seen) {
            if self.table.track(name, now) {
                log::info!("new file {name}, holding for {:?}", self.table.buffer());
            }
        }
        for name in self.seen.difference(&listing) {
            if self.table.cancel(name) {
                log::info!("{name} removed before forwarding");
            }
        }
        self.seen = listing;

        Ok(self
            .table
            .drain_due(now)
            .into_iter()
            .map(|name| self.dir.join(name))
            .filter(|path| path.exists())
            .collect())
    }

    /// Poll every `interval` until `cancel` fires, handing due files to
    /// `on_due`.
    pub fn run<F>(&mut self, interval: Duration, cancel: &CancelToken, mut on_due: F) -> io::Result<()>
    where
        F: FnMut(PathBuf),
    {
        log::info!("watching {} (buffer {:?})", self.dir.display(), self.table.buffer());
        while !cancel.is_cancelled() {
            for path in self.poll(Instant::now())? {
                on_due(path);
            }
            std::thread::sleep(interval);
        }
        log::info!("stopped watching {}", self.dir.display());
        Ok(())
    }
}
