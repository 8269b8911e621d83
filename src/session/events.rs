/// User-visible happenings, emitted for the surrounding shell to render.
///
/// Events carry owned data only; consuming them never touches session state.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The session opened successfully.
    Started,
    /// A new bot question is ready to play.
    BotPrompt { text: String },
    /// The capture device is live.
    RecordingStarted,
    /// An answer was accepted by the server.
    AnswerSubmitted { transcription: String },
    /// A recoverable failure the user should see.
    Failed { message: String },
    /// The session was torn down; no further events follow.
    TornDown,
}
