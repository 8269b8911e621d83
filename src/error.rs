use thiserror::Error;

use crate::session::SessionPhase;

pub type SessionResult<T> = Result<T, SessionError>;

/// Failure kinds surfaced by the interview session components.
///
/// Device and network failures are recoverable: the controller stays in (or
/// returns to) a phase the user can act from. `InvalidPhase` and `NoSuchTurn`
/// indicate a caller bug, not a user-facing condition.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Device permission was denied or no capture device exists.
    #[error("media device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Recording stopped before any data was buffered.
    #[error("recording produced no data")]
    EmptyCapture,

    /// Transport-level failure, including request timeouts.
    #[error("network request failed: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("server returned status {status}")]
    BadResponse { status: u16 },

    /// A body declared as structured data could not be interpreted.
    #[error("malformed structured response: {0}")]
    MalformedResponse(String),

    /// An operation was invoked outside its guard phase.
    #[error("operation requires phase {required:?} but session is {actual:?}")]
    InvalidPhase {
        required: SessionPhase,
        actual: SessionPhase,
    },

    /// A transcript update had no matching last turn.
    #[error("transcript has no matching last turn")]
    NoSuchTurn,
}

impl From<reqwest::Error> for SessionError {
    fn from(err: reqwest::Error) -> Self {
        SessionError::Network(err.to_string())
    }
}
