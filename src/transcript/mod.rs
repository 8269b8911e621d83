//! Append-only interview transcript.
//!
//! Turns are never reordered or removed; the only rewrite allowed is filling
//! in the content of the most recent turn once a transcription arrives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};

/// Who uttered a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Bot,
    User,
}

/// One utterance in the interview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Opaque unique identifier
    pub id: String,

    /// Who spoke
    pub speaker: Speaker,

    /// Prompt or answer text
    pub content: String,

    /// When the turn was recorded
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(speaker: Speaker, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            speaker,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn bot(content: impl Into<String>) -> Self {
        Self::new(Speaker::Bot, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Speaker::User, content)
    }
}

/// Ordered log of interview turns.
#[derive(Debug, Default)]
pub struct TranscriptStore {
    turns: Vec<Turn>,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// Append a turn. Always succeeds, preserves insertion order.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Rewrite the content of the most recently appended turn.
    ///
    /// Fails with `NoSuchTurn` when the store is empty or the last turn was
    /// not uttered by `speaker`.
    pub fn update_last(&mut self, speaker: Speaker, content: impl Into<String>) -> SessionResult<()> {
        match self.turns.last_mut() {
            Some(turn) if turn.speaker == speaker => {
                turn.content = content.into();
                Ok(())
            }
            _ => Err(SessionError::NoSuchTurn),
        }
    }

    /// Restartable view over the turns, oldest first.
    pub fn turns(&self) -> impl Iterator<Item = &Turn> + '_ {
        self.turns.iter()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Owned copy of the full transcript.
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }
}
