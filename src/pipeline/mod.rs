//! Worker pools between the watcher and the upload sink.
//!
//! ```text
//! settled paths ──► file workers ──► transfer queue ──► upload workers ──► sink
//!   (bounded)      (split/read)        (bounded)
//! ```
//!
//! Both queues are bounded, so a slow sink stalls extraction rather than
//! growing memory. Workers check the cancellation token before taking each
//! item; an item already being processed runs to completion.

mod processor;
mod transfer;
mod uploader;

pub use processor::{process_path, ProcessSummary};
pub use transfer::{classify, remote_path, ContentType, FileKind, TransferFile};

use crate::config::PipelineConfig;
use crate::recency::RecencyFilter;
use crate::upload::UploadSink;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Configured worker pools sharing one sink and one recency filter.
pub struct Pipeline {
    settings: PipelineConfig,
    prefix: String,
    sink: Arc<dyn UploadSink>,
    recent: Arc<RecencyFilter>,
}

impl Pipeline {
    pub fn new(settings: PipelineConfig, prefix: impl Into<String>, sink: Arc<dyn UploadSink>) -> Self {
        let recent = Arc::new(RecencyFilter::new(settings.recent_fragments));
        Self {
            settings,
            prefix: prefix.into(),
            sink,
            recent,
        }
    }

    pub fn recent(&self) -> &Arc<RecencyFilter> {
        &self.recent
    }

    /// Spawn the file and upload workers.
    ///
    /// Paths sent through the returned handle are processed until `cancel`
    /// fires or every sender is dropped and the queues drain.
    pub fn start(&self, cancel: CancellationToken) -> PipelineHandle {
        let capacity = self.settings.queue_capacity.max(1);
        let (file_tx, file_rx) = mpsc::channel::<PathBuf>(capacity);
        let (transfer_tx, transfer_rx) = mpsc::channel::<TransferFile>(capacity);
        let file_rx = Arc::new(Mutex::new(file_rx));
        let transfer_rx = Arc::new(Mutex::new(transfer_rx));

        let mut workers = Vec::with_capacity(self.settings.file_workers + self.settings.upload_workers);

        for id in 0..self.settings.file_workers {
            workers.push(tokio::spawn(run_file_worker(
                id,
                file_rx.clone(),
                transfer_tx.clone(),
                self.recent.clone(),
                cancel.clone(),
            )));
        }
        // File workers now own every transfer sender; upload workers finish
        // once those exit and the queue is empty.
        drop(transfer_tx);

        for id in 0..self.settings.upload_workers {
            workers.push(tokio::spawn(uploader::run_upload_worker(
                id,
                transfer_rx.clone(),
                self.sink.clone(),
                self.prefix.clone(),
                cancel.clone(),
            )));
        }

        tracing::info!(
            file_workers = self.settings.file_workers,
            upload_workers = self.settings.upload_workers,
            sink = %self.sink.describe(),
            "Pipeline started"
        );

        PipelineHandle {
            files: file_tx,
            workers,
        }
    }
}

/// Input side of a running pipeline.
pub struct PipelineHandle {
    files: mpsc::Sender<PathBuf>,
    workers: Vec<JoinHandle<()>>,
}

impl PipelineHandle {
    /// Sender for settled paths, e.g. for the watcher.
    pub fn sender(&self) -> mpsc::Sender<PathBuf> {
        self.files.clone()
    }

    /// Queue a path; waits while the queue is full. Returns `false` once the
    /// pipeline has stopped.
    pub async fn submit(&self, path: PathBuf) -> bool {
        self.files.send(path).await.is_ok()
    }

    /// Close this handle's sender and wait for every worker to exit.
    pub async fn join(self) {
        drop(self.files);
        for worker in self.workers {
            if let Err(e) = worker.await {
                tracing::error!("Pipeline worker panicked: {}", e);
            }
        }
        tracing::info!("Pipeline stopped");
    }
}

/// Receive the next item unless cancelled first.
pub(crate) async fn next_item<T>(
    rx: &Mutex<mpsc::Receiver<T>>,
    cancel: &CancellationToken,
) -> Option<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        item = async { rx.lock().await.recv().await } => item,
    }
}

async fn run_file_worker(
    id: usize,
    files: Arc<Mutex<mpsc::Receiver<PathBuf>>>,
    transfers: mpsc::Sender<TransferFile>,
    recent: Arc<RecencyFilter>,
    cancel: CancellationToken,
) {
    tracing::trace!(worker = id, "File worker started");

    while let Some(path) = next_item(&files, &cancel).await {
        let span = tracing::info_span!("process", file = %path.display());
        let transfers = transfers.clone();
        let recent = recent.clone();

        async move {
            tracing::debug!("Processing");
            let span = tracing::Span::current();
            let result = tokio::task::spawn_blocking(move || {
                span.in_scope(|| process_path(&path, &recent, &transfers))
            })
            .await;

            match result {
                Ok(Ok(summary)) => {
                    if summary.queued > 0 || summary.skipped > 0 {
                        tracing::info!(
                            queued = summary.queued,
                            skipped = summary.skipped,
                            "File processed"
                        );
                    }
                }
                Ok(Err(e)) => tracing::warn!("Problem while processing: {}", e),
                Err(e) => tracing::error!("File worker task failed: {}", e),
            }
        }
        .instrument(span)
        .await;
    }

    tracing::trace!(worker = id, "File worker stopped");
}
