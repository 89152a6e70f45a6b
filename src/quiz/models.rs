//! Quiz questions as produced by the model in quiz mode.
//!
//! The model answers with a JSON array where each element carries a
//! `type` discriminator:
//!
//! ```json
//! {"type": "mcq", "question": "...", "options": ["A", "B"], "correctAnswerIndex": 0, "explanation": "..."}
//! {"type": "truefalse", "question": "...", "options": ["Vrai", "Faux"], "correctAnswerIndex": 1, "explanation": "..."}
//! {"type": "case", "question": "...", "correctAnswer": "...", "explanation": "..."}
//! ```
//!
//! Elements are converted into the `QuizRecord` sum type so that a
//! case study can never carry an answer index and a choice question
//! always carries one that points at an existing option.
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum QuizKind {
    #[serde(rename = "mcq")]
    MultipleChoice,
    #[serde(rename = "truefalse")]
    TrueFalse,
    #[serde(rename = "case")]
    CaseStudy,
}

impl QuizKind {
    /// Map the wire tag to a kind. Unknown tags are rejected rather
    /// than guessed from the other fields.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "mcq" => Some(Self::MultipleChoice),
            "truefalse" => Some(Self::TrueFalse),
            "case" => Some(Self::CaseStudy),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::MultipleChoice => "mcq",
            Self::TrueFalse => "truefalse",
            Self::CaseStudy => "case",
        }
    }
}

impl fmt::Display for QuizKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// A multiple choice or true/false question.
#[derive(Clone, Debug, PartialEq)]
pub struct ChoiceQuestion {
    pub prompt: String,
    pub options: Vec<String>,
    correct_index: usize,
    pub explanation: String,
}

impl ChoiceQuestion {
    /// Returns `None` when `correct_index` doesn't point at one of the
    /// options.
    pub fn new(
        prompt: &str,
        options: Vec<String>,
        correct_index: usize,
        explanation: &str,
    ) -> Option<Self> {
        if correct_index >= options.len() {
            return None;
        }
        Some(Self {
            prompt: prompt.to_string(),
            options,
            correct_index,
            explanation: explanation.to_string(),
        })
    }

    pub fn correct_index(&self) -> usize {
        self.correct_index
    }

    pub fn correct_option(&self) -> &str {
        &self.options[self.correct_index]
    }
}

/// An open question graded against a reference answer.
#[derive(Clone, Debug, PartialEq)]
pub struct CaseStudyQuestion {
    pub prompt: String,
    pub reference_answer: String,
    pub explanation: String,
}

/// One validated question extracted from a quiz reply.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawQuestion", into = "RawQuestion")]
pub enum QuizRecord {
    MultipleChoice(ChoiceQuestion),
    TrueFalse(ChoiceQuestion),
    CaseStudy(CaseStudyQuestion),
}

impl QuizRecord {
    pub fn kind(&self) -> QuizKind {
        match self {
            Self::MultipleChoice(_) => QuizKind::MultipleChoice,
            Self::TrueFalse(_) => QuizKind::TrueFalse,
            Self::CaseStudy(_) => QuizKind::CaseStudy,
        }
    }

    pub fn prompt(&self) -> &str {
        match self {
            Self::MultipleChoice(q) | Self::TrueFalse(q) => &q.prompt,
            Self::CaseStudy(q) => &q.prompt,
        }
    }

    /// Empty for case studies.
    pub fn options(&self) -> &[String] {
        match self {
            Self::MultipleChoice(q) | Self::TrueFalse(q) => &q.options,
            Self::CaseStudy(_) => &[],
        }
    }

    /// Always `None` for case studies, never a placeholder value.
    pub fn correct_index(&self) -> Option<usize> {
        match self {
            Self::MultipleChoice(q) | Self::TrueFalse(q) => Some(q.correct_index()),
            Self::CaseStudy(_) => None,
        }
    }

    pub fn reference_answer(&self) -> Option<&str> {
        match self {
            Self::CaseStudy(q) => Some(&q.reference_answer),
            _ => None,
        }
    }

    pub fn explanation(&self) -> &str {
        match self {
            Self::MultipleChoice(q) | Self::TrueFalse(q) => &q.explanation,
            Self::CaseStudy(q) => &q.explanation,
        }
    }
}

/// The loosely typed shape the model actually sends.
#[derive(Clone, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawQuestion {
    #[serde(rename = "type")]
    pub kind: String,
    pub question: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    #[serde(default)]
    pub explanation: String,
}

impl TryFrom<RawQuestion> for QuizRecord {
    type Error = String;

    fn try_from(raw: RawQuestion) -> Result<Self, Self::Error> {
        let kind = QuizKind::from_tag(&raw.kind)
            .ok_or_else(|| format!("Unrecognized question type: {}", raw.kind))?;

        match kind {
            QuizKind::MultipleChoice | QuizKind::TrueFalse => {
                let idx = raw
                    .correct_answer_index
                    .ok_or_else(|| format!("Question of type {} missing correctAnswerIndex", kind))?;
                let idx = usize::try_from(idx)
                    .map_err(|_| format!("Negative correctAnswerIndex: {}", idx))?;
                let num_options = raw.options.len();
                let question =
                    ChoiceQuestion::new(&raw.question, raw.options, idx, &raw.explanation)
                        .ok_or_else(|| {
                            format!(
                                "correctAnswerIndex {} out of range for {} options",
                                idx, num_options
                            )
                        })?;
                if kind == QuizKind::MultipleChoice {
                    Ok(Self::MultipleChoice(question))
                } else {
                    Ok(Self::TrueFalse(question))
                }
            }
            QuizKind::CaseStudy => {
                let reference_answer = raw
                    .correct_answer
                    .ok_or_else(|| "Case study missing correctAnswer".to_string())?;
                Ok(Self::CaseStudy(CaseStudyQuestion {
                    prompt: raw.question,
                    reference_answer,
                    explanation: raw.explanation,
                }))
            }
        }
    }
}

impl From<QuizRecord> for RawQuestion {
    fn from(record: QuizRecord) -> Self {
        let kind = record.kind().tag().to_string();
        match record {
            QuizRecord::MultipleChoice(q) | QuizRecord::TrueFalse(q) => RawQuestion {
                kind,
                correct_answer_index: Some(q.correct_index as i64),
                question: q.prompt,
                options: q.options,
                correct_answer: None,
                explanation: q.explanation,
            },
            QuizRecord::CaseStudy(q) => RawQuestion {
                kind,
                question: q.prompt,
                options: vec![],
                correct_answer_index: None,
                correct_answer: Some(q.reference_answer),
                explanation: q.explanation,
            },
        }
    }
}
