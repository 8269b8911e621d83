//! Network boundary: the interview backend HTTP contract.

mod submission;

pub use submission::{
    SessionOpening, SubmissionApi, SubmissionClient, SubmissionResult, FALLBACK_ANSWER_TEXT,
    FALLBACK_PROMPT, OPENING_PROMPT,
};
