use chrono::{DateTime, Utc};
use serde::Serialize;

use super::SessionPhase;

/// Point-in-time view of a session, for status displays.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    /// Current position in the turn-taking state machine
    pub phase: SessionPhase,

    /// When the session opened, if it has
    pub started_at: Option<DateTime<Utc>>,

    /// Seconds since the session opened
    pub duration_secs: f64,

    /// Total turns in the transcript
    pub turns: usize,

    /// Turns spoken by the candidate
    pub user_turns: usize,
}
