//! Accumulates the chunks of one streamed reply and decides, once
//! the stream ends, whether it is shown as prose or as a quiz.
use serde::Serialize;

use crate::quiz::{
    ParseError, QuizRecord, has_fence, has_text_after_fence, looks_structured, strip_fences,
    try_parse_quiz,
};

/// Shown in place of the reply when the request itself failed.
pub const TRANSPORT_ERROR_TEXT: &str = "Erreur de génération.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    Pending,
    Prose,
    Quiz,
    Failed,
}

/// What the user finally sees for a reply.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outcome {
    Prose { text: String },
    Quiz { questions: Vec<QuizRecord> },
    Failed { text: String },
}

/// Emitted to whoever renders the reply while it streams in.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionUpdate {
    /// The reply so far is prose and safe to show.
    Preview { text: String },
    /// The reply might be a quiz so nothing is shown yet.
    Loading,
    /// The stream ended. Replaces any preview shown so far.
    Done { outcome: Outcome },
}

/// Accumulation and classification state for the reply to one
/// user request.
#[derive(Debug)]
pub struct StreamSession {
    buffer: String,
    chunk_count: usize,
    terminal: TerminalState,
    outcome: Option<Outcome>,
}

impl Default for StreamSession {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamSession {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            chunk_count: 0,
            terminal: TerminalState::Pending,
            outcome: None,
        }
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    pub fn terminal(&self) -> TerminalState {
        self.terminal
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    /// Append the next chunk of the reply. Chunks must arrive in order
    /// and only while the session is pending.
    pub fn append(&mut self, chunk: &str) {
        debug_assert_eq!(
            self.terminal,
            TerminalState::Pending,
            "Chunk appended to a finished stream session"
        );
        self.buffer.push_str(chunk);
        self.chunk_count += 1;
    }

    pub fn looks_structured(&self) -> bool {
        looks_structured(&self.buffer)
    }

    /// The update to show after the latest chunk.
    pub fn update(&self) -> SessionUpdate {
        match &self.outcome {
            Some(outcome) => SessionUpdate::Done {
                outcome: outcome.clone(),
            },
            None if self.looks_structured() || self.buffer.trim().is_empty() => {
                SessionUpdate::Loading
            }
            None => SessionUpdate::Preview {
                text: self.buffer.clone(),
            },
        }
    }

    /// The stream ended normally. Decide between quiz and prose. Calling
    /// this again returns the decision already made.
    pub fn finish(&mut self) -> &Outcome {
        match self.outcome {
            Some(ref outcome) => outcome,
            None => {
                let outcome = self.decide();
                self.outcome.insert(outcome)
            }
        }
    }

    /// The request failed before the stream completed. Nothing received
    /// so far is shown.
    pub fn fail(&mut self) -> &Outcome {
        match self.outcome {
            Some(ref outcome) => outcome,
            None => {
                self.terminal = TerminalState::Failed;
                self.outcome.insert(Outcome::Failed {
                    text: TRANSPORT_ERROR_TEXT.to_string(),
                })
            }
        }
    }

    fn decide(&mut self) -> Outcome {
        // A block followed by more text is prose with an example in it
        let fenced = has_fence(&self.buffer) && !has_text_after_fence(&self.buffer);
        let stripped = strip_fences(&self.buffer);

        match try_parse_quiz(&stripped) {
            Ok(questions) => {
                tracing::debug!("Reply parsed as a quiz of {} questions", questions.len());
                self.terminal = TerminalState::Quiz;
                Outcome::Quiz { questions }
            }
            Err(e) => {
                log_parse_failure(&e, self.looks_structured());
                self.terminal = TerminalState::Prose;
                let text = if fenced { stripped } else { self.buffer.clone() };
                Outcome::Prose { text }
            }
        }
    }
}

fn log_parse_failure(err: &ParseError, looked_structured: bool) {
    match err {
        // Ordinary prose, nothing worth mentioning
        ParseError::NotArray if !looked_structured => {}
        _ => tracing::debug!("Reply is not a quiz, showing as prose: {}", err),
    }
}
