pub mod capture;
pub mod client;
pub mod config;
pub mod error;
pub mod playback;
pub mod session;
pub mod transcript;

pub use capture::{
    CaptureBackend, CaptureConfig, CaptureFactory, CapturedAnswer, MediaCapture, MediaChunk,
    MicrophoneBackend, MicrophoneFactory,
};
pub use client::{
    SessionOpening, SubmissionApi, SubmissionClient, SubmissionResult, FALLBACK_ANSWER_TEXT,
    FALLBACK_PROMPT, OPENING_PROMPT,
};
pub use config::{Config, ServerConfig};
pub use error::{SessionError, SessionResult};
pub use playback::{BotAudioHandle, BotAudioSource, PlaybackManager};
pub use session::{SessionController, SessionEvent, SessionPhase, SessionStats};
pub use transcript::{Speaker, TranscriptStore, Turn};
