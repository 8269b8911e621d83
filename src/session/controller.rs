use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::events::SessionEvent;
use super::stats::SessionStats;
use crate::capture::{CaptureFactory, CapturedAnswer, MediaCapture};
use crate::client::{SubmissionApi, SubmissionResult, FALLBACK_ANSWER_TEXT};
use crate::error::{SessionError, SessionResult};
use crate::playback::{BotAudioSource, PlaybackManager};
use crate::transcript::{Speaker, TranscriptStore, Turn};

/// Position in the turn-taking state machine. Exactly one phase is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionPhase {
    NotStarted,
    AwaitingResponse,
    Recording,
    Submitting,
    Errored,
}

struct SessionState {
    phase: SessionPhase,
    transcript: TranscriptStore,
    playback: PlaybackManager,
    capture: Option<MediaCapture>,
    pending_answer: Option<CapturedAnswer>,
    started_at: Option<DateTime<Utc>>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            phase: SessionPhase::NotStarted,
            transcript: TranscriptStore::new(),
            playback: PlaybackManager::new(),
            capture: None,
            pending_answer: None,
            started_at: None,
        }
    }

    fn expect_phase(&self, required: SessionPhase) -> SessionResult<()> {
        if self.phase == required {
            Ok(())
        } else {
            Err(SessionError::InvalidPhase {
                required,
                actual: self.phase,
            })
        }
    }
}

/// Orchestrates one interview session.
///
/// Every transcript and playback mutation goes through this controller, and
/// every operation is gated on its required phase; a call made outside that
/// phase fails immediately with `InvalidPhase` instead of queueing. The
/// state lock is never held across a network await, so `teardown` can run
/// while a submission is in flight; the suspended continuation observes the
/// liveness flag on resume and no-ops.
pub struct SessionController {
    api: Arc<dyn SubmissionApi>,
    capture_factory: Arc<dyn CaptureFactory>,
    state: Arc<Mutex<SessionState>>,
    alive: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<SessionEvent>,
    submit_task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionController {
    /// Create a controller and the event stream the surrounding shell
    /// renders notifications from.
    pub fn new(
        api: Arc<dyn SubmissionApi>,
        capture_factory: Arc<dyn CaptureFactory>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let controller = Self {
            api,
            capture_factory,
            state: Arc::new(Mutex::new(SessionState::new())),
            alive: Arc::new(AtomicBool::new(true)),
            events,
            submit_task: Mutex::new(None),
        };
        (controller, events_rx)
    }

    /// Open the session and install the opening question.
    ///
    /// Valid only from `NotStarted`; on failure the session stays there and
    /// the user may try again.
    pub async fn start(&self) -> SessionResult<()> {
        {
            let state = self.state.lock().await;
            self.guard(&state, SessionPhase::NotStarted)?;
        }

        match self.api.start_session().await {
            Ok(opening) => {
                let mut state = self.state.lock().await;
                self.guard(&state, SessionPhase::NotStarted)?;

                state.playback.set(opening.audio);
                state.transcript.append(Turn::bot(opening.prompt.clone()));
                state.phase = SessionPhase::AwaitingResponse;
                state.started_at = Some(Utc::now());

                info!("interview session started");
                self.emit(SessionEvent::Started);
                self.emit(SessionEvent::BotPrompt {
                    text: opening.prompt,
                });
                Ok(())
            }
            Err(err) => {
                warn!("failed to start interview session: {}", err);
                self.emit(SessionEvent::Failed {
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Acquire the capture device and begin recording an answer.
    ///
    /// Valid only from `AwaitingResponse`; a device failure is recoverable
    /// and leaves the phase unchanged.
    pub async fn begin_recording(&self) -> SessionResult<()> {
        {
            let state = self.state.lock().await;
            self.guard(&state, SessionPhase::AwaitingResponse)?;
        }

        let backend = match self.capture_factory.create() {
            Ok(backend) => backend,
            Err(err) => {
                warn!("could not create capture backend: {}", err);
                self.emit(SessionEvent::Failed {
                    message: err.to_string(),
                });
                return Err(err);
            }
        };

        match MediaCapture::acquire_and_start(backend).await {
            Ok(capture) => {
                let mut state = self.state.lock().await;
                if let Err(err) = self.guard(&state, SessionPhase::AwaitingResponse) {
                    // Torn down while the device was coming up.
                    drop(state);
                    if let Err(abort_err) = capture.abort().await {
                        warn!("failed to release capture device: {}", abort_err);
                    }
                    return Err(err);
                }
                state.capture = Some(capture);
                state.phase = SessionPhase::Recording;
                info!("recording started");
                self.emit(SessionEvent::RecordingStarted);
                Ok(())
            }
            Err(err) => {
                warn!("could not access the recording device: {}", err);
                self.emit(SessionEvent::Failed {
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Stop recording and submit the finalized answer.
    ///
    /// Valid only from `Recording`. The phase moves to `Submitting` and the
    /// device is released before anything else happens; the submission
    /// itself runs as a background continuation (`wait_for_submission`
    /// awaits it). An empty capture returns the session to
    /// `AwaitingResponse` with the transcript untouched.
    pub async fn end_recording(&self) -> SessionResult<()> {
        let capture = {
            let mut state = self.state.lock().await;
            self.guard(&state, SessionPhase::Recording)?;
            let Some(capture) = state.capture.take() else {
                return Err(SessionError::InvalidPhase {
                    required: SessionPhase::Recording,
                    actual: state.phase,
                });
            };
            state.phase = SessionPhase::Submitting;
            capture
        };

        let answer = match capture.stop_and_finalize().await {
            Ok(answer) => answer,
            Err(err) => {
                let mut state = self.state.lock().await;
                if self.alive() {
                    state.phase = SessionPhase::AwaitingResponse;
                }
                warn!("recording could not be finalized: {}", err);
                self.emit(SessionEvent::Failed {
                    message: err.to_string(),
                });
                return Err(err);
            }
        };

        if !self.alive() {
            debug!("session torn down while finalizing; dropping the recorded answer");
            return Ok(());
        }

        info!("answer recorded: {} bytes ({})", answer.data.len(), answer.mime);
        self.spawn_submission(answer).await;
        Ok(())
    }

    /// Re-submit the answer retained by a failed submission.
    pub async fn retry(&self) -> SessionResult<()> {
        let answer = {
            let mut state = self.state.lock().await;
            self.guard(&state, SessionPhase::Errored)?;
            let Some(answer) = state.pending_answer.take() else {
                return Err(SessionError::InvalidPhase {
                    required: SessionPhase::Errored,
                    actual: state.phase,
                });
            };
            state.phase = SessionPhase::Submitting;
            answer
        };

        info!("retrying answer submission");
        self.spawn_submission(answer).await;
        Ok(())
    }

    /// Abandon the failed answer and return to `AwaitingResponse` so the
    /// user can re-record. The bot's question is still the last turn.
    pub async fn discard(&self) -> SessionResult<()> {
        let mut state = self.state.lock().await;
        self.guard(&state, SessionPhase::Errored)?;
        state.pending_answer = None;
        state.phase = SessionPhase::AwaitingResponse;
        info!("discarded failed answer");
        Ok(())
    }

    /// Release every held resource and force the inert sentinel phase.
    ///
    /// The only cancellation primitive: any suspended continuation that
    /// resumes afterwards observes the liveness flag and leaves the state
    /// untouched. All operations fail with `InvalidPhase` from here on.
    pub async fn teardown(&self) {
        self.alive.store(false, Ordering::SeqCst);

        let capture = {
            let mut state = self.state.lock().await;
            let capture = state.capture.take();
            state.playback.teardown();
            state.pending_answer = None;
            state.phase = SessionPhase::NotStarted;
            capture
        };

        if let Some(capture) = capture {
            if let Err(err) = capture.abort().await {
                warn!("failed to release capture device during teardown: {}", err);
            }
        }

        info!("session torn down");
        self.emit(SessionEvent::TornDown);
    }

    /// Await the in-flight submission continuation, if any.
    pub async fn wait_for_submission(&self) {
        let task = self.submit_task.lock().await.take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                error!("submission task panicked: {}", err);
            }
        }
    }

    pub async fn phase(&self) -> SessionPhase {
        self.state.lock().await.phase
    }

    /// Snapshot of the transcript, oldest turn first.
    pub async fn transcript(&self) -> Vec<Turn> {
        self.state.lock().await.transcript.snapshot()
    }

    /// Source of the live bot utterance, if any.
    pub async fn current_audio(&self) -> Option<BotAudioSource> {
        let state = self.state.lock().await;
        state.playback.current().map(|handle| handle.source().clone())
    }

    pub async fn stats(&self) -> SessionStats {
        let state = self.state.lock().await;
        let duration_secs = state
            .started_at
            .map(|started| {
                Utc::now().signed_duration_since(started).num_milliseconds() as f64 / 1000.0
            })
            .unwrap_or(0.0);

        SessionStats {
            phase: state.phase,
            started_at: state.started_at,
            duration_secs,
            turns: state.transcript.len(),
            user_turns: state
                .transcript
                .turns()
                .filter(|turn| turn.speaker == Speaker::User)
                .count(),
        }
    }

    async fn spawn_submission(&self, answer: CapturedAnswer) {
        let api = Arc::clone(&self.api);
        let state = Arc::clone(&self.state);
        let alive = Arc::clone(&self.alive);
        let events = self.events.clone();

        let task = tokio::spawn(async move {
            let outcome = api.submit_answer(&answer).await;

            let mut state = state.lock().await;
            if !alive.load(Ordering::SeqCst) {
                debug!("session torn down mid-submission; discarding the result");
                return;
            }

            match outcome {
                Ok(result) => {
                    state.transcript.append(Turn::user(FALLBACK_ANSWER_TEXT));
                    if let SubmissionResult::Transcribed { text, .. } = &result {
                        if let Err(err) = state.transcript.update_last(Speaker::User, text.clone())
                        {
                            error!("failed to record transcription: {}", err);
                        }
                    }

                    let user_content = result.user_content().to_string();
                    let next_prompt = result.next_prompt().to_string();
                    state.playback.set(result.into_next_audio());
                    state.transcript.append(Turn::bot(next_prompt.clone()));
                    state.phase = SessionPhase::AwaitingResponse;
                    state.pending_answer = None;

                    info!("answer accepted; next question ready");
                    let _ = events.send(SessionEvent::AnswerSubmitted {
                        transcription: user_content,
                    });
                    let _ = events.send(SessionEvent::BotPrompt { text: next_prompt });
                }
                Err(err) => {
                    warn!("answer submission failed: {}", err);
                    state.pending_answer = Some(answer);
                    state.phase = SessionPhase::Errored;
                    let _ = events.send(SessionEvent::Failed {
                        message: err.to_string(),
                    });
                }
            }
        });

        *self.submit_task.lock().await = Some(task);
    }

    fn guard(&self, state: &SessionState, required: SessionPhase) -> SessionResult<()> {
        if !self.alive() {
            return Err(SessionError::InvalidPhase {
                required,
                actual: state.phase,
            });
        }
        state.expect_phase(required)
    }

    fn alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}
