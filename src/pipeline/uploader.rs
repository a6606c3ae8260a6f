use super::transfer::{remote_path, TransferFile};
use super::next_item;
use crate::upload::UploadSink;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// Push transfers to the sink until cancelled or the queue closes.
///
/// Failures are logged and the transfer is dropped; a later pass over the
/// same index produces the fragment again only if it has left the recency
/// window.
pub(super) async fn run_upload_worker(
    id: usize,
    transfers: Arc<Mutex<mpsc::Receiver<TransferFile>>>,
    sink: Arc<dyn UploadSink>,
    prefix: String,
    cancel: CancellationToken,
) {
    tracing::trace!(worker = id, "Upload worker started");

    while let Some(transfer) = next_item(&transfers, &cancel).await {
        let name = remote_path(&prefix, &transfer.remote_filename);
        let size = transfer.payload.len();

        match sink
            .upload(&name, transfer.payload, transfer.content_type)
            .await
        {
            Ok(()) => {
                let latency = transfer.created_at.elapsed();
                tracing::info!(
                    object = %name,
                    bytes = size,
                    latency_ms = latency.as_millis() as u64,
                    "Uploaded {}", transfer.remote_filename
                );
            }
            Err(e) => {
                tracing::warn!(object = %name, error = %e, "Upload failed");
            }
        }
    }

    tracing::trace!(worker = id, "Upload worker stopped");
}
