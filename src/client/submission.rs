use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, info};

use crate::capture::CapturedAnswer;
use crate::config::ServerConfig;
use crate::error::{SessionError, SessionResult};
use crate::playback::BotAudioHandle;

/// Prompt paired with the opening utterance.
pub const OPENING_PROMPT: &str = "Tell me about yourself.";
/// User-turn content when the server returns no transcription.
pub const FALLBACK_ANSWER_TEXT: &str = "Audio/Video response submitted";
/// Bot prompt when the server returns no message text.
pub const FALLBACK_PROMPT: &str = "Next question...";

const START_PATH: &str = "/start_interview";
const SUBMIT_PATH: &str = "/submit_answer";
const ANSWER_FIELD: &str = "audio_video";
const ANSWER_FILENAME: &str = "answer.webm";

/// Result of the session-open exchange.
#[derive(Debug)]
pub struct SessionOpening {
    pub audio: BotAudioHandle,
    pub prompt: String,
}

/// Normalized answer-submission outcome.
///
/// The server may return a fully processed turn (structured, with a
/// transcription) or a bare audio stream for the next question. The split is
/// decided once here, at the network boundary, so downstream logic is
/// exhaustive over two variants instead of re-inspecting content types.
#[derive(Debug)]
pub enum SubmissionResult {
    /// Structured response carrying the answer's transcription.
    Transcribed {
        text: String,
        next_audio: BotAudioHandle,
        next_prompt: String,
    },
    /// Raw audio response; only the next utterance is known.
    AudioOnly { next_audio: BotAudioHandle },
}

impl SubmissionResult {
    /// Content for the user turn this submission produced.
    pub fn user_content(&self) -> &str {
        match self {
            SubmissionResult::Transcribed { text, .. } => text,
            SubmissionResult::AudioOnly { .. } => FALLBACK_ANSWER_TEXT,
        }
    }

    /// Prompt text for the next bot turn.
    pub fn next_prompt(&self) -> &str {
        match self {
            SubmissionResult::Transcribed { next_prompt, .. } => next_prompt,
            SubmissionResult::AudioOnly { .. } => FALLBACK_PROMPT,
        }
    }

    pub fn into_next_audio(self) -> BotAudioHandle {
        match self {
            SubmissionResult::Transcribed { next_audio, .. } => next_audio,
            SubmissionResult::AudioOnly { next_audio } => next_audio,
        }
    }
}

/// The two network operations the session depends on.
#[async_trait]
pub trait SubmissionApi: Send + Sync {
    async fn start_session(&self) -> SessionResult<SessionOpening>;
    async fn submit_answer(&self, answer: &CapturedAnswer) -> SessionResult<SubmissionResult>;
}

/// HTTP client for the interview backend.
pub struct SubmissionClient {
    http: reqwest::Client,
    base_url: String,
}

impl SubmissionClient {
    pub fn new(config: &ServerConfig) -> SessionResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl SubmissionApi for SubmissionClient {
    async fn start_session(&self) -> SessionResult<SessionOpening> {
        info!("opening interview session against {}", self.base_url);

        let response = self.http.post(self.url(START_PATH)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::BadResponse {
                status: status.as_u16(),
            });
        }

        let mime = declared_content_type(&response).unwrap_or_else(|| "audio/mpeg".to_string());
        let body = response.bytes().await?;
        debug!("opening utterance: {} bytes ({})", body.len(), mime);

        Ok(SessionOpening {
            audio: BotAudioHandle::from_bytes(body.to_vec(), mime),
            prompt: OPENING_PROMPT.to_string(),
        })
    }

    async fn submit_answer(&self, answer: &CapturedAnswer) -> SessionResult<SubmissionResult> {
        let part = Part::bytes(answer.data.clone())
            .file_name(ANSWER_FILENAME)
            .mime_str(&answer.mime)?;
        let form = Form::new().part(ANSWER_FIELD, part);

        debug!("submitting answer: {} bytes ({})", answer.data.len(), answer.mime);
        let response = self
            .http
            .post(self.url(SUBMIT_PATH))
            .multipart(form)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::BadResponse {
                status: status.as_u16(),
            });
        }

        let content_type = declared_content_type(&response).unwrap_or_default();
        let body = response.bytes().await?;
        normalize_answer_response(&content_type, body.to_vec())
    }
}

fn declared_content_type(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

/// Structured `/submit_answer` body. `transcription` and `message` are
/// optional on the wire; `audio_url` is required to form the next turn.
#[derive(Debug, Deserialize)]
struct AnswerBody {
    transcription: Option<String>,
    audio_url: Option<String>,
    message: Option<String>,
}

fn normalize_answer_response(content_type: &str, body: Vec<u8>) -> SessionResult<SubmissionResult> {
    if content_type.contains("application/json") {
        let parsed: AnswerBody = serde_json::from_slice(&body)
            .map_err(|err| SessionError::MalformedResponse(format!("undecodable body: {err}")))?;
        let audio_url = parsed
            .audio_url
            .ok_or_else(|| SessionError::MalformedResponse("missing audio_url".to_string()))?;

        Ok(SubmissionResult::Transcribed {
            text: parsed
                .transcription
                .unwrap_or_else(|| FALLBACK_ANSWER_TEXT.to_string()),
            next_audio: BotAudioHandle::from_url(audio_url),
            next_prompt: parsed
                .message
                .unwrap_or_else(|| FALLBACK_PROMPT.to_string()),
        })
    } else {
        let mime = if content_type.is_empty() {
            "audio/mpeg".to_string()
        } else {
            content_type.to_string()
        };
        Ok(SubmissionResult::AudioOnly {
            next_audio: BotAudioHandle::from_bytes(body, mime),
        })
    }
}
