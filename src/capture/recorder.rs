use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::backend::{CaptureBackend, CapturedAnswer, MediaChunk};
use crate::error::{SessionError, SessionResult};

/// Buffers chunks from a capture backend and finalizes one answer clip.
///
/// The backend is stopped before the buffered chunks are touched, so the
/// device never outlives the recording regardless of how finalization ends.
pub struct MediaCapture {
    backend: Box<dyn CaptureBackend>,
    chunks: Arc<Mutex<Vec<MediaChunk>>>,
    collector: Option<JoinHandle<()>>,
}

impl MediaCapture {
    /// Acquire the device and begin buffering chunks.
    ///
    /// Fails with `DeviceUnavailable` when access is denied or no device
    /// exists; in that case nothing is held.
    pub async fn acquire_and_start(mut backend: Box<dyn CaptureBackend>) -> SessionResult<Self> {
        let mut rx = backend.start().await?;
        info!("capture started on backend '{}'", backend.name());

        let chunks = Arc::new(Mutex::new(Vec::new()));
        let buffer = Arc::clone(&chunks);
        let collector = tokio::spawn(async move {
            while let Some(chunk) = rx.recv().await {
                buffer.lock().await.push(chunk);
            }
        });

        Ok(Self {
            backend,
            chunks,
            collector: Some(collector),
        })
    }

    /// Stop the device and concatenate everything captured so far.
    ///
    /// Fails with `EmptyCapture` instead of producing a zero-byte answer.
    pub async fn stop_and_finalize(mut self) -> SessionResult<CapturedAnswer> {
        self.release_device().await?;

        let chunks = {
            let mut guard = self.chunks.lock().await;
            std::mem::take(&mut *guard)
        };

        let total: usize = chunks.iter().map(|c| c.data.len()).sum();
        if total == 0 {
            return Err(SessionError::EmptyCapture);
        }

        let mut data = Vec::with_capacity(total);
        for chunk in &chunks {
            data.extend_from_slice(&chunk.data);
        }

        info!("finalized answer clip: {} bytes in {} chunks", total, chunks.len());

        Ok(CapturedAnswer {
            data,
            mime: self.backend.mime_type().to_string(),
        })
    }

    /// Stop the device and discard the buffer.
    pub async fn abort(mut self) -> SessionResult<()> {
        self.release_device().await
    }

    async fn release_device(&mut self) -> SessionResult<()> {
        let stopped = self.backend.stop().await;
        if let Some(handle) = self.collector.take() {
            if let Err(err) = handle.await {
                error!("chunk collector task panicked: {}", err);
            }
        }
        stopped
    }
}
