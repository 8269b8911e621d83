//! Device-media capture
//!
//! A `CaptureBackend` acquires the input device and streams encoded chunks;
//! `MediaCapture` buffers them and finalizes exactly one `CapturedAnswer`
//! per recording. The production backend records the microphone through
//! cpal; tests substitute scripted backends through `CaptureFactory`.

pub mod backend;
mod microphone;
mod recorder;

pub use backend::{
    CaptureBackend, CaptureConfig, CaptureFactory, CapturedAnswer, MediaChunk, MicrophoneFactory,
};
pub use microphone::MicrophoneBackend;
pub use recorder::MediaCapture;
