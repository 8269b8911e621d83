use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::error::SessionResult;

/// One encoded fragment of recorded media, delivered in capture order.
#[derive(Debug, Clone)]
pub struct MediaChunk {
    pub data: Vec<u8>,
}

/// The finalized recording of one answer.
///
/// Produced exactly once per recording by `MediaCapture::stop_and_finalize`
/// and handed to the submission client; never duplicated.
#[derive(Debug)]
pub struct CapturedAnswer {
    pub data: Vec<u8>,
    pub mime: String,
}

/// Configuration for capture backends.
#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    /// Target sample rate (captured audio is downsampled if needed)
    pub target_sample_rate: u32,
    /// Target channel count (1 = mono, 2 = stereo)
    pub target_channels: u16,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16000,
            target_channels: 1,
        }
    }
}

/// Device-capture backend trait.
///
/// Implementations:
/// - `MicrophoneBackend`: cpal default input device
/// - scripted backends in the test suite
#[async_trait]
pub trait CaptureBackend: Send {
    /// Acquire the device and start capturing.
    ///
    /// Returns a channel receiver that yields encoded chunks in capture
    /// order. The channel closes once the backend has flushed everything
    /// after `stop`.
    async fn start(&mut self) -> SessionResult<mpsc::Receiver<MediaChunk>>;

    /// Stop capturing and release the device.
    async fn stop(&mut self) -> SessionResult<()>;

    /// Whether the device is currently held.
    fn is_capturing(&self) -> bool;

    /// Declared MIME type of the finalized clip.
    fn mime_type(&self) -> &str;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Creates a fresh backend for each recording.
pub trait CaptureFactory: Send + Sync {
    fn create(&self) -> SessionResult<Box<dyn CaptureBackend>>;
}

/// Factory for the cpal microphone backend.
pub struct MicrophoneFactory {
    config: CaptureConfig,
}

impl MicrophoneFactory {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }
}

impl CaptureFactory for MicrophoneFactory {
    fn create(&self) -> SessionResult<Box<dyn CaptureBackend>> {
        Ok(Box::new(super::microphone::MicrophoneBackend::new(
            self.config.clone(),
        )))
    }
}
