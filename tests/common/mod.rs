//! Shared test harness for integration tests.
//!
//! Provides [`RecordingSink`], an in-memory [`UploadSink`] that remembers
//! every object it receives, and helpers for polling it from async tests.

use bytes::Bytes;
use hdspush::config::PipelineConfig;
use hdspush::pipeline::ContentType;
use hdspush::upload::UploadSink;
use hdspush::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::time::Duration;

/// One object received by a [`RecordingSink`].
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub payload: Bytes,
    pub content_type: ContentType,
}

/// Sink that stores uploads in memory and can be told to fail some names.
#[derive(Default)]
pub struct RecordingSink {
    uploads: Mutex<Vec<Upload>>,
    failing: HashSet<String>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject uploads of exactly these names.
    pub fn failing<I: IntoIterator<Item = &'static str>>(names: I) -> Self {
        Self {
            uploads: Mutex::new(Vec::new()),
            failing: names.into_iter().map(String::from).collect(),
        }
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().clone()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.uploads.lock().iter().map(|u| u.name.clone()).collect();
        names.sort();
        names
    }

    /// Poll until at least `count` uploads arrived or `timeout` passed.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.uploads.lock().len() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.uploads.lock().len() >= count
    }
}

#[async_trait::async_trait]
impl UploadSink for RecordingSink {
    async fn upload(&self, name: &str, payload: Bytes, content_type: ContentType) -> Result<()> {
        if self.failing.contains(name) {
            return Err(Error::upload(name, "rejected by test sink"));
        }
        self.uploads.lock().push(Upload {
            name: name.to_string(),
            payload,
            content_type,
        });
        Ok(())
    }

    fn describe(&self) -> String {
        "recording".to_string()
    }
}

/// Small pools so tests exercise sharing without spawning dozens of tasks.
pub fn small_pipeline() -> PipelineConfig {
    PipelineConfig {
        file_workers: 2,
        upload_workers: 3,
        queue_capacity: 4,
        recent_fragments: 100,
    }
}
