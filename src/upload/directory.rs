use super::{validate_name, UploadSink};
use crate::error::Result;
use crate::pipeline::ContentType;
use bytes::Bytes;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writes objects below a local directory, e.g. an origin's document root.
///
/// Each object is written to a temporary file in its target directory and
/// renamed into place, so readers never observe a partial fragment.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
    overwrite: bool,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>, overwrite: bool) -> Self {
        Self {
            root: root.into(),
            overwrite,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn write_atomic(target: &Path, payload: &[u8], overwrite: bool) -> std::io::Result<bool> {
    if !overwrite && target.exists() {
        return Ok(false);
    }

    let parent = target.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(payload)?;
    temp.as_file().sync_data()?;
    temp.persist(target).map_err(|e| e.error)?;
    Ok(true)
}

#[async_trait::async_trait]
impl UploadSink for DirectorySink {
    async fn upload(&self, name: &str, payload: Bytes, content_type: ContentType) -> Result<()> {
        validate_name(name)?;
        let target = self.root.join(name);
        let overwrite = self.overwrite;

        tracing::debug!(object = %name, content_type = %content_type, "Writing {} bytes", payload.len());

        let path = target.clone();
        let written = tokio::task::spawn_blocking(move || write_atomic(&path, &payload, overwrite))
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))??;

        if !written {
            tracing::debug!(object = %name, "Target exists, skipping: {:?}", target);
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("directory {}", self.root.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_writes_nested_object() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path(), true);

        sink.upload("hds/liveSeg1-Frag1", Bytes::from_static(b"fragment"), ContentType::F4f)
            .await
            .unwrap();

        let written = std::fs::read(dir.path().join("hds/liveSeg1-Frag1")).unwrap();
        assert_eq!(written, b"fragment");
    }

    #[tokio::test]
    async fn test_overwrite_flag() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("hds/live.f4m");

        let keep = DirectorySink::new(dir.path(), false);
        keep.upload("hds/live.f4m", Bytes::from_static(b"first"), ContentType::F4m)
            .await
            .unwrap();
        keep.upload("hds/live.f4m", Bytes::from_static(b"second"), ContentType::F4m)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"first");

        let replace = DirectorySink::new(dir.path(), true);
        replace
            .upload("hds/live.f4m", Bytes::from_static(b"third"), ContentType::F4m)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"third");
    }

    #[tokio::test]
    async fn test_rejects_escaping_name() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path().join("root"), true);
        let result = sink
            .upload("../outside", Bytes::from_static(b"x"), ContentType::F4f)
            .await;
        assert!(result.is_err());
        assert!(!dir.path().join("outside").exists());
    }
}
