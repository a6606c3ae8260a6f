use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatchConfig {
    /// Directories the encoder writes HDS files into
    #[serde(default)]
    pub paths: Vec<PathBuf>,

    /// Also watch subdirectories (default: false)
    #[serde(default)]
    pub recursive: bool,

    /// File extensions to pick up, without the leading dot
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Quiet time after the last change before a file is read (default: 1500)
    #[serde(default = "default_settle_time_ms")]
    pub settle_time_ms: u64,

    /// How often pending files are re-checked (default: 250)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Queue files already present when the watcher starts (default: false)
    #[serde(default)]
    pub scan_existing: bool,
}

fn default_extensions() -> Vec<String> {
    vec!["f4x".to_string(), "f4m".to_string(), "bootstrap".to_string()]
}

fn default_settle_time_ms() -> u64 {
    1500
}

fn default_poll_interval_ms() -> u64 {
    250
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            recursive: false,
            extensions: default_extensions(),
            settle_time_ms: default_settle_time_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            scan_existing: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Tasks splitting settled files (default: 20)
    #[serde(default = "default_workers")]
    pub file_workers: usize,

    /// Tasks pushing transfers to the sink (default: 20)
    #[serde(default = "default_workers")]
    pub upload_workers: usize,

    /// Capacity of the settled-file and transfer channels (default: 256)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Number of fragment names remembered for deduplication (default: 2000)
    #[serde(default = "default_recent_fragments")]
    pub recent_fragments: usize,
}

fn default_workers() -> usize {
    20
}

fn default_queue_capacity() -> usize {
    256
}

fn default_recent_fragments() -> usize {
    crate::recency::DEFAULT_RECENT_FRAGMENTS
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            file_workers: default_workers(),
            upload_workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            recent_fragments: default_recent_fragments(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Directory,
    Http,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    #[serde(default)]
    pub kind: SinkKind,

    /// Root directory for the directory sink
    #[serde(default)]
    pub destination: Option<PathBuf>,

    /// Origin URL for the HTTP sink, e.g. `https://origin.example.com/live`
    #[serde(default)]
    pub base_url: Option<String>,

    /// Path prefix prepended to every remote name (default: "hds")
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Replace objects that already exist (default: true)
    #[serde(default = "default_overwrite")]
    pub overwrite: bool,

    /// Per-request timeout for the HTTP sink (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Sent as `Authorization: Bearer <token>` by the HTTP sink
    #[serde(default)]
    pub bearer_token: Option<String>,
}

fn default_prefix() -> String {
    "hds".to_string()
}

fn default_overwrite() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::default(),
            destination: None,
            base_url: None,
            prefix: default_prefix(),
            overwrite: default_overwrite(),
            timeout_secs: default_timeout_secs(),
            bearer_token: None,
        }
    }
}
