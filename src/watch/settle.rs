use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::mpsc;

/// Size and modification time observed on one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    len: u64,
    modified: Option<SystemTime>,
}

impl FileStamp {
    fn read(path: &Path) -> Option<Self> {
        let metadata = std::fs::metadata(path).ok()?;
        if !metadata.is_file() {
            return None;
        }
        Some(Self {
            len: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}

#[derive(Debug)]
struct PendingFile {
    last_event: Instant,
    last_stamp: Option<FileStamp>,
}

/// Tracks files and determines when they've "settled" (stopped changing)
///
/// A file settles once no change event has arrived for the settle duration
/// and its size and mtime are identical on two consecutive polls.
pub struct FileSettleTracker {
    pending: HashMap<PathBuf, PendingFile>,
    /// How long a file must be free of change events
    settle_duration: Duration,
    settled_tx: mpsc::Sender<PathBuf>,
}

impl FileSettleTracker {
    pub fn new(settle_duration: Duration, settled_tx: mpsc::Sender<PathBuf>) -> Self {
        Self {
            pending: HashMap::new(),
            settle_duration,
            settled_tx,
        }
    }

    /// Record that a file was modified
    pub fn file_changed(&mut self, path: PathBuf) {
        self.file_changed_at(path, Instant::now());
    }

    fn file_changed_at(&mut self, path: PathBuf, now: Instant) {
        self.pending.insert(
            path,
            PendingFile {
                last_event: now,
                last_stamp: None,
            },
        );
    }

    /// Poll pending files and return those that have settled.
    ///
    /// Files that disappeared are dropped silently.
    fn collect_settled(&mut self, now: Instant) -> Vec<PathBuf> {
        let settle_duration = self.settle_duration;
        let mut settled = Vec::new();

        self.pending.retain(|path, pending| {
            if now.duration_since(pending.last_event) < settle_duration {
                return true;
            }

            let Some(stamp) = FileStamp::read(path) else {
                tracing::debug!("Pending file vanished: {:?}", path);
                return false;
            };

            if pending.last_stamp == Some(stamp) {
                settled.push(path.clone());
                false
            } else {
                pending.last_stamp = Some(stamp);
                true
            }
        });

        settled
    }

    /// Check for settled files and send them
    ///
    /// Returns `false` once the receiving side has gone away.
    pub async fn check_settled(&mut self) -> bool {
        for path in self.collect_settled(Instant::now()) {
            tracing::debug!("File settled: {:?}", path);
            if self.settled_tx.send(path).await.is_err() {
                tracing::debug!("Settled file receiver closed");
                return false;
            }
        }
        true
    }

    /// Remove a file from tracking (e.g., if deleted)
    pub fn remove(&mut self, path: &Path) {
        self.pending.remove(path);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
