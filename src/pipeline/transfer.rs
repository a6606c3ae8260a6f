//! Units of work crossing from the file workers to the upload workers.

use bytes::Bytes;
use std::fmt;
use std::path::Path;
use std::time::Instant;

/// MIME type attached to an uploaded object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    /// A single extracted fragment.
    F4f,
    /// A bootstrap (`abst`) file.
    Bootstrap,
    /// An f4m manifest.
    F4m,
}

impl ContentType {
    pub fn mime(self) -> &'static str {
        match self {
            ContentType::F4f => "video/f4f",
            ContentType::Bootstrap => "application/binary",
            ContentType::F4m => "application/f4m",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// How a watched file is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// `.f4x` index; split into fragments using its `.f4f` sibling.
    Index,
    /// `.bootstrap`; forwarded as-is.
    Bootstrap,
    /// `.f4m`; forwarded as-is.
    Manifest,
}

impl FileKind {
    /// Content type of the objects produced from a file of this kind.
    pub fn content_type(self) -> ContentType {
        match self {
            FileKind::Index => ContentType::F4f,
            FileKind::Bootstrap => ContentType::Bootstrap,
            FileKind::Manifest => ContentType::F4m,
        }
    }
}

/// Classify a path by its (case-insensitive) extension.
pub fn classify(path: &Path) -> Option<FileKind> {
    let ext = path.extension()?.to_string_lossy().to_lowercase();
    match ext.as_str() {
        "f4x" => Some(FileKind::Index),
        "bootstrap" => Some(FileKind::Bootstrap),
        "f4m" => Some(FileKind::Manifest),
        _ => None,
    }
}

/// An object ready for the upload sink.
#[derive(Debug, Clone)]
pub struct TransferFile {
    /// When the object was produced; upload latency is measured from here.
    pub created_at: Instant,
    /// Object name relative to the sink prefix.
    pub remote_filename: String,
    pub payload: Bytes,
    pub content_type: ContentType,
}

impl TransferFile {
    pub fn new(remote_filename: impl Into<String>, payload: Bytes, content_type: ContentType) -> Self {
        Self {
            created_at: Instant::now(),
            remote_filename: remote_filename.into(),
            payload,
            content_type,
        }
    }
}

/// Full object name under `prefix`; an empty prefix leaves the name unchanged.
pub fn remote_path(prefix: &str, remote_filename: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        remote_filename.to_string()
    } else {
        format!("{}/{}", prefix, remote_filename)
    }
}
