//! Public types for the quiz API
use serde::{Deserialize, Serialize};

use crate::quiz::QuizRecord;

#[derive(Deserialize)]
pub struct GradeRequest {
    pub question: QuizRecord,
    pub answer: String,
}

/// The student's answer to one question, in order.
#[derive(Deserialize, Clone, Copy, Debug)]
#[serde(untagged)]
pub enum QuizAnswer {
    /// Index of the chosen option
    Choice(usize),
    /// Verdict of a graded case study
    Graded { correct: bool },
}

#[derive(Deserialize)]
pub struct ScoreRequest {
    pub questions: Vec<QuizRecord>,
    pub answers: Vec<QuizAnswer>,
}

#[derive(Serialize)]
pub struct ScoreResponse {
    pub correct: usize,
    pub total: usize,
    pub feedback: String,
    pub results: Vec<bool>,
}
