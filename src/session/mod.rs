//! Interview session orchestration
//!
//! This module provides the `SessionController` abstraction that manages:
//! - The turn-taking state machine (phase gating, retry, teardown)
//! - Device capture start/stop through `MediaCapture`
//! - Answer submission and response interpretation
//! - Transcript and playback-handle bookkeeping
//! - Notification events for the surrounding shell

mod controller;
mod events;
mod stats;

pub use controller::{SessionController, SessionPhase};
pub use events::SessionEvent;
pub use stats::SessionStats;
