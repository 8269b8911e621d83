//! Ownership of the current bot utterance.
//!
//! A `BotAudioHandle` is released by consuming it, so a released handle can
//! never be read. `PlaybackManager` holds at most one live handle and swaps
//! the old one out before installing a replacement.

use tracing::debug;

/// Where the playable audio comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotAudioSource {
    /// A URL the sink can stream from
    Remote(String),
    /// Audio bytes returned inline by the server
    Inline { data: Vec<u8>, mime: String },
}

/// The currently playable bot-utterance resource.
#[derive(Debug)]
pub struct BotAudioHandle {
    source: BotAudioSource,
}

impl BotAudioHandle {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            source: BotAudioSource::Remote(url.into()),
        }
    }

    pub fn from_bytes(data: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            source: BotAudioSource::Inline {
                data,
                mime: mime.into(),
            },
        }
    }

    pub fn source(&self) -> &BotAudioSource {
        &self.source
    }

    /// Inline audio bytes, if the utterance was returned in the body.
    pub fn inline_bytes(&self) -> Option<&[u8]> {
        match &self.source {
            BotAudioSource::Inline { data, .. } => Some(data),
            BotAudioSource::Remote(_) => None,
        }
    }

    /// Free the underlying resource.
    pub fn release(self) {
        match &self.source {
            BotAudioSource::Remote(url) => debug!("releasing bot audio handle for {}", url),
            BotAudioSource::Inline { data, .. } => {
                debug!("releasing inline bot audio ({} bytes)", data.len())
            }
        }
    }
}

/// Owns the live bot-audio handle across turns.
#[derive(Debug, Default)]
pub struct PlaybackManager {
    current: Option<BotAudioHandle>,
}

impl PlaybackManager {
    pub fn new() -> Self {
        Self { current: None }
    }

    /// Install a new handle, releasing the previous one first.
    pub fn set(&mut self, handle: BotAudioHandle) {
        if let Some(previous) = self.current.take() {
            previous.release();
        }
        self.current = Some(handle);
    }

    pub fn current(&self) -> Option<&BotAudioHandle> {
        self.current.as_ref()
    }

    /// Release the current handle, if any. Idempotent.
    pub fn teardown(&mut self) {
        if let Some(handle) = self.current.take() {
            handle.release();
        }
    }
}
