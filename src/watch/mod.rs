pub mod settle;

pub use settle::FileSettleTracker;

use crate::config::WatchConfig;
use anyhow::{Context, Result};
use notify::event::{AccessKind, AccessMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// File watcher that monitors directories for new HDS files
pub struct FileWatcher {
    config: WatchConfig,
    watcher: Option<RecommendedWatcher>,
}

impl FileWatcher {
    pub fn new(config: WatchConfig) -> Self {
        Self {
            config,
            watcher: None,
        }
    }

    /// Start watching configured directories
    ///
    /// Settled paths are sent on `settled_tx`. The returned task runs until
    /// `cancel` fires or the receiver is dropped.
    pub fn start(
        &mut self,
        settled_tx: mpsc::Sender<PathBuf>,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<()>> {
        if self.config.paths.is_empty() {
            anyhow::bail!("No watch paths configured");
        }

        let (event_tx, mut event_rx) = mpsc::channel::<PathBuf>(256);
        let mut settle_tracker = FileSettleTracker::new(
            Duration::from_millis(self.config.settle_time_ms),
            settled_tx,
        );

        let extensions = self.config.extensions.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) if is_write_event(&event.kind) => {
                    for path in event.paths {
                        if is_watched_file(&path, &extensions) {
                            let _ = event_tx.blocking_send(path);
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Watch error: {}", e),
            },
            Config::default(),
        )
        .context("Failed to create file watcher")?;

        let mode = if self.config.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };

        for path in &self.config.paths {
            if path.exists() {
                watcher
                    .watch(path, mode)
                    .with_context(|| format!("Failed to watch path: {:?}", path))?;
                tracing::info!("Watching directory: {:?}", path);
            } else {
                tracing::warn!("Watch path does not exist: {:?}", path);
            }
        }

        if self.config.scan_existing {
            for path in existing_files(&self.config.paths, &self.config.extensions) {
                tracing::debug!("Adding existing file: {:?}", path);
                settle_tracker.file_changed(path);
            }
        }

        self.watcher = Some(watcher);

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms.max(1));
        let handle = tokio::spawn(async move {
            let mut check_interval = tokio::time::interval(poll_interval);
            check_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,

                    event = event_rx.recv() => match event {
                        Some(path) => {
                            tracing::trace!("File event: {:?}", path);
                            settle_tracker.file_changed(path);
                        }
                        None => break,
                    },

                    _ = check_interval.tick() => {
                        if !settle_tracker.check_settled().await {
                            break;
                        }
                    }
                }
            }

            tracing::info!("File watcher stopped");
        });

        Ok(handle)
    }

    /// Stop watching
    pub fn stop(&mut self) {
        self.watcher = None;
    }
}

/// Events that can mean new content: creation, modification, rename into
/// the directory and close-after-write.
fn is_write_event(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_)
            | EventKind::Modify(_)
            | EventKind::Access(AccessKind::Close(AccessMode::Write))
    )
}

/// Check if a file has one of the watched extensions
pub fn is_watched_file(path: &Path, extensions: &[String]) -> bool {
    match path.extension() {
        Some(ext) => {
            let ext = ext.to_string_lossy();
            extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext))
        }
        None => false,
    }
}

/// Files with watched extensions directly inside `paths`.
pub fn existing_files(paths: &[PathBuf], extensions: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for dir in paths {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Failed to list {:?}: {}", dir, e);
                continue;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_file() && is_watched_file(&path, extensions) {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}
