//! Turns one settled file into transfers.
//!
//! Runs on a blocking thread: splitting is synchronous file I/O, and queued
//! transfers are handed over with `blocking_send` so a slow sink throttles
//! extraction instead of buffering fragments in memory.

use super::transfer::{classify, FileKind, TransferFile};
use crate::error::Result;
use crate::recency::RecencyFilter;
use bytes::Bytes;
use hdspush_f4v::{live_edge_from_bytes, HdsSegmentSplitter, LiveEdgeMode};
use std::path::Path;
use tokio::sync::mpsc;

/// What happened to one file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessSummary {
    pub queued: usize,
    pub skipped: usize,
    /// The transfer queue closed before everything was handed over.
    pub interrupted: bool,
}

/// Split or read `path` and queue the resulting transfers.
///
/// Fragments already in `recent` are skipped. Errors abort the file; any
/// fragments queued before the error stay queued.
pub fn process_path(
    path: &Path,
    recent: &RecencyFilter,
    transfers: &mpsc::Sender<TransferFile>,
) -> Result<ProcessSummary> {
    match classify(path) {
        Some(FileKind::Index) => split_index(path, recent, transfers),
        Some(kind) => forward_whole(path, kind, transfers),
        None => {
            tracing::debug!("No action defined for {:?}", path);
            Ok(ProcessSummary::default())
        }
    }
}

fn split_index(
    path: &Path,
    recent: &RecencyFilter,
    transfers: &mpsc::Sender<TransferFile>,
) -> Result<ProcessSummary> {
    let splitter = HdsSegmentSplitter::new(path, None)?;
    let content_type = FileKind::Index.content_type();
    let mut summary = ProcessSummary::default();

    for fragment in splitter.split()? {
        let fragment = fragment?;
        let name = fragment.remote_name(splitter.stream_name());

        if !recent.contains_or_insert(&name) {
            tracing::debug!(fragment = %name, "Skipping previously processed fragment");
            summary.skipped += 1;
            continue;
        }

        tracing::debug!(fragment = %name, bytes = fragment.payload.len(), "Queueing fragment");
        let transfer = TransferFile::new(name, fragment.payload, content_type);
        if let Err(mpsc::error::SendError(unsent)) = transfers.blocking_send(transfer) {
            tracing::debug!("Transfer queue closed");
            recent.forget(&unsent.remote_filename);
            summary.interrupted = true;
            break;
        }
        summary.queued += 1;
    }

    Ok(summary)
}

fn forward_whole(
    path: &Path,
    kind: FileKind,
    transfers: &mpsc::Sender<TransferFile>,
) -> Result<ProcessSummary> {
    let payload = Bytes::from(std::fs::read(path)?);
    let remote_filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if kind == FileKind::Bootstrap {
        match live_edge_from_bytes(payload.clone(), LiveEdgeMode::default()) {
            Ok(edge) => tracing::debug!(live_edge = %edge, "Bootstrap decoded"),
            Err(e) => tracing::debug!("Bootstrap live edge unavailable: {}", e),
        }
    }

    let transfer = TransferFile::new(remote_filename, payload, kind.content_type());
    let mut summary = ProcessSummary::default();
    if transfers.blocking_send(transfer).is_err() {
        summary.interrupted = true;
    } else {
        summary.queued = 1;
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ContentType;
    use hdspush_f4v::fixtures;

    fn drain(rx: &mut mpsc::Receiver<TransferFile>) -> Vec<TransferFile> {
        let mut out = Vec::new();
        while let Ok(t) = rx.try_recv() {
            out.push(t);
        }
        out
    }

    #[test]
    fn test_index_yields_named_fragments_in_index_order() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = fixtures::write_segment(dir.path(), "liveSeg2", 2, &[3, 1, 2]);
        let (tx, mut rx) = mpsc::channel(16);
        let recent = RecencyFilter::new(10);

        let summary = process_path(&fixture.index_path, &recent, &tx).unwrap();
        assert_eq!(summary.queued, 3);

        let transfers = drain(&mut rx);
        let names: Vec<_> = transfers.iter().map(|t| t.remote_filename.as_str()).collect();
        assert_eq!(names, ["liveSeg2-Frag3", "liveSeg2-Frag1", "liveSeg2-Frag2"]);
        assert!(transfers.iter().all(|t| t.content_type == ContentType::F4f));
        for (transfer, (_, expected)) in transfers.iter().zip(&fixture.fragments) {
            assert_eq!(transfer.payload.as_ref(), expected.as_slice());
        }
    }

    #[test]
    fn test_reprocessing_skips_recent_fragments() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = fixtures::write_segment(dir.path(), "liveSeg1", 1, &[1, 2]);
        let (tx, mut rx) = mpsc::channel(16);
        let recent = RecencyFilter::new(10);

        process_path(&fixture.index_path, &recent, &tx).unwrap();
        let second = process_path(&fixture.index_path, &recent, &tx).unwrap();

        assert_eq!(second, ProcessSummary { queued: 0, skipped: 2, interrupted: false });
        assert_eq!(drain(&mut rx).len(), 2);
    }

    #[test]
    fn test_manifest_and_bootstrap_forwarded_whole() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("live.f4m");
        std::fs::write(&manifest, b"<manifest/>").unwrap();
        let bootstrap = dir.path().join("live.bootstrap");
        std::fs::write(&bootstrap, b"not really a box").unwrap();

        let (tx, mut rx) = mpsc::channel(4);
        let recent = RecencyFilter::new(10);
        process_path(&manifest, &recent, &tx).unwrap();
        process_path(&bootstrap, &recent, &tx).unwrap();

        let transfers = drain(&mut rx);
        assert_eq!(transfers[0].remote_filename, "live.f4m");
        assert_eq!(transfers[0].content_type, ContentType::F4m);
        assert_eq!(transfers[0].payload.as_ref(), b"<manifest/>");
        assert_eq!(transfers[1].remote_filename, "live.bootstrap");
        assert_eq!(transfers[1].content_type, ContentType::Bootstrap);
    }

    #[test]
    fn test_missing_media_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = fixtures::write_segment(dir.path(), "liveSeg1", 1, &[1]);
        std::fs::remove_file(&fixture.media_path).unwrap();

        let (tx, _rx) = mpsc::channel(4);
        let err = process_path(&fixture.index_path, &RecencyFilter::new(10), &tx).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Decode(hdspush_f4v::Error::NotFound(_))
        ));
    }

    #[test]
    fn test_closed_queue_interrupts() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = fixtures::write_segment(dir.path(), "liveSeg1", 1, &[1, 2]);
        let (tx, rx) = mpsc::channel(4);
        drop(rx);

        let recent = RecencyFilter::new(10);
        let summary = process_path(&fixture.index_path, &recent, &tx).unwrap();
        assert!(summary.interrupted);
        assert_eq!(summary.queued, 0);
        assert!(!recent.contains("liveSeg1-Frag1"));
        assert!(recent.is_empty());
    }

    #[test]
    fn test_unknown_extension_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"x").unwrap();

        let (tx, mut rx) = mpsc::channel(4);
        let summary = process_path(&path, &RecencyFilter::new(10), &tx).unwrap();
        assert_eq!(summary, ProcessSummary::default());
        assert!(drain(&mut rx).is_empty());
    }
}
