// Shared test doubles: scripted submission APIs and capture backends.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

use interview_client::{
    BotAudioHandle, CaptureBackend, CaptureFactory, CapturedAnswer, MediaChunk, SessionError,
    SessionOpening, SessionResult, SubmissionApi, SubmissionResult, OPENING_PROMPT,
};

pub fn opening(audio: &[u8]) -> SessionOpening {
    SessionOpening {
        audio: BotAudioHandle::from_bytes(audio.to_vec(), "audio/mpeg"),
        prompt: OPENING_PROMPT.to_string(),
    }
}

pub fn transcribed(text: &str, url: &str, prompt: &str) -> SubmissionResult {
    SubmissionResult::Transcribed {
        text: text.to_string(),
        next_audio: BotAudioHandle::from_url(url),
        next_prompt: prompt.to_string(),
    }
}

pub fn audio_only(audio: &[u8]) -> SubmissionResult {
    SubmissionResult::AudioOnly {
        next_audio: BotAudioHandle::from_bytes(audio.to_vec(), "audio/mpeg"),
    }
}

/// Submission API that replays queued responses.
///
/// When a gate is attached, `submit_answer` blocks until the gate is
/// notified, which lets tests interleave teardown with an in-flight
/// submission.
#[derive(Default)]
pub struct ScriptedApi {
    start_results: Mutex<VecDeque<SessionResult<SessionOpening>>>,
    submit_results: Mutex<VecDeque<SessionResult<SubmissionResult>>>,
    submit_calls: AtomicUsize,
    gate: Option<Arc<Notify>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gate(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn push_start(&self, result: SessionResult<SessionOpening>) {
        self.start_results.lock().unwrap().push_back(result);
    }

    pub fn push_submit(&self, result: SessionResult<SubmissionResult>) {
        self.submit_results.lock().unwrap().push_back(result);
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubmissionApi for ScriptedApi {
    async fn start_session(&self) -> SessionResult<SessionOpening> {
        self.start_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(SessionError::Network("no scripted start response".into())))
    }

    async fn submit_answer(&self, _answer: &CapturedAnswer) -> SessionResult<SubmissionResult> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.submit_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(SessionError::Network("no scripted submit response".into())))
    }
}

/// Capture backend that emits a fixed chunk sequence and records whether the
/// device was released.
pub struct ScriptedCapture {
    chunks: Vec<Vec<u8>>,
    tx: Option<mpsc::Sender<MediaChunk>>,
    stopped: Arc<AtomicBool>,
    capturing: bool,
}

impl ScriptedCapture {
    pub fn new(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            chunks,
            tx: None,
            stopped: Arc::new(AtomicBool::new(false)),
            capturing: false,
        }
    }

    pub fn stopped_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stopped)
    }
}

#[async_trait]
impl CaptureBackend for ScriptedCapture {
    async fn start(&mut self) -> SessionResult<mpsc::Receiver<MediaChunk>> {
        let (tx, rx) = mpsc::channel(64);
        for chunk in &self.chunks {
            tx.send(MediaChunk {
                data: chunk.clone(),
            })
            .await
            .expect("chunk channel open");
        }
        self.tx = Some(tx);
        self.capturing = true;
        Ok(rx)
    }

    async fn stop(&mut self) -> SessionResult<()> {
        self.stopped.store(true, Ordering::SeqCst);
        // Dropping the sender closes the chunk channel.
        self.tx = None;
        self.capturing = false;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn mime_type(&self) -> &str {
        "video/webm"
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Factory that hands out queued backends, or fails when the queue is empty.
#[derive(Default)]
pub struct ScriptedFactory {
    backends: Mutex<VecDeque<SessionResult<Box<dyn CaptureBackend>>>>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, backend: ScriptedCapture) {
        self.backends
            .lock()
            .unwrap()
            .push_back(Ok(Box::new(backend)));
    }

    pub fn push_err(&self, err: SessionError) {
        self.backends.lock().unwrap().push_back(Err(err));
    }
}

impl CaptureFactory for ScriptedFactory {
    fn create(&self) -> SessionResult<Box<dyn CaptureBackend>> {
        self.backends
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(SessionError::DeviceUnavailable("no scripted backend".into())))
    }
}
