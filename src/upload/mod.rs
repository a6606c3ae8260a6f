//! Destinations for extracted fragments and manifests.

mod directory;
mod http;

pub use directory::DirectorySink;
pub use http::HttpSink;

use crate::config::{SinkKind, UploadConfig};
use crate::error::{Error, Result};
use crate::pipeline::ContentType;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

/// Capability to store one named object.
///
/// Objects are delivered independently and in no particular order, and the
/// same name may be delivered more than once; implementations must treat
/// each call as an idempotent put.
#[async_trait::async_trait]
pub trait UploadSink: Send + Sync {
    /// Store `payload` under `name` (a `/`-separated relative path).
    async fn upload(&self, name: &str, payload: Bytes, content_type: ContentType) -> Result<()>;

    /// Human-readable destination for logs.
    fn describe(&self) -> String;
}

/// Build the sink selected by `config`.
pub fn create_sink(config: &UploadConfig) -> Result<Arc<dyn UploadSink>> {
    match config.kind {
        SinkKind::Directory => {
            let root = config
                .destination
                .clone()
                .ok_or_else(|| Error::Config("directory sink requires a destination".into()))?;
            Ok(Arc::new(DirectorySink::new(root, config.overwrite)))
        }
        SinkKind::Http => {
            let base_url = config
                .base_url
                .clone()
                .ok_or_else(|| Error::Config("http sink requires a base_url".into()))?;
            let sink = HttpSink::new(
                &base_url,
                Duration::from_secs(config.timeout_secs),
                config.bearer_token.clone(),
                config.overwrite,
            )?;
            Ok(Arc::new(sink))
        }
    }
}

/// Reject names that could escape the sink root.
fn validate_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name.starts_with('/')
        || name.contains('\\')
        || name.split('/').any(|part| part.is_empty() || part == "." || part == "..");
    if bad {
        return Err(Error::upload(name, "invalid object name"));
    }
    Ok(())
}
