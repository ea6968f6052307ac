//! Progress reporting port for hosts that display a running batch.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Events emitted by the batch scanner, always from the orchestrating thread.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    /// A batch of `total` files is about to be scanned.
    Started {
        /// Files in the selection.
        total: usize,
    },
    /// Every file of a chunk has been scanned.
    ChunkCompleted {
        /// Files scanned so far.
        processed: usize,
        /// Files in the selection.
        total: usize,
        /// Separators found so far.
        separators: usize,
    },
    /// Sorting is done and records are about to be returned.
    Finished {
        /// Files scanned.
        processed: usize,
        /// Wall time of the batch.
        elapsed: Duration,
    },
}

/// Receiver of [`ScanEvent`]s.
pub trait ProgressSink: Send + Sync {
    /// Called for each event.
    fn on_event(&self, event: ScanEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ScanEvent) + Send + Sync,
{
    fn on_event(&self, event: ScanEvent) {
        self(event)
    }
}

/// Sink that logs events at `info`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn on_event(&self, event: ScanEvent) {
        match event {
            ScanEvent::Started { total } => log::info!("scanning {total} files"),
            ScanEvent::ChunkCompleted {
                processed,
                total,
                separators,
            } => log::info!("processed {processed}/{total} ({separators} separators)"),
            ScanEvent::Finished { processed, elapsed } => {
                log::info!("scanned {processed} files in {elapsed:.2?}")
            }
        }
    }
}

/// Cooperative cancellation flag, checked between chunks.
#[derive(Debug, Default, Clone)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation at the next chunk boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
