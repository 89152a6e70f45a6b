use serde_json::Value;
use thiserror::Error;

use super::models::{QuizKind, QuizRecord};

/// Expected outcomes of trying to read a reply as a quiz. None of
/// these are shown to the user, they all mean "render it as prose".
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("reply is not a JSON array")]
    NotArray,
    #[error("reply looks like an array but is not valid JSON: {0}")]
    SyntaxError(String),
    #[error("reply is not a recognized list of quiz questions")]
    UnrecognizedShape,
}

/// Parse a complete, fence stripped reply into quiz questions.
///
/// Elements with a recognized `type` but missing the fields that type
/// requires are skipped. The result is never an empty list.
pub fn try_parse_quiz(text: &str) -> Result<Vec<QuizRecord>, ParseError> {
    let text = text.trim();
    if !text.starts_with('[') {
        return Err(ParseError::NotArray);
    }
    // Opened like an array but cut off or followed by prose
    if !text.ends_with(']') {
        return Err(ParseError::SyntaxError("unterminated array".to_string()));
    }

    let elements = serde_json::from_str::<Vec<Value>>(text)
        .map_err(|e| ParseError::SyntaxError(e.to_string()))?;

    let first_kind = elements
        .first()
        .and_then(|v| v["type"].as_str())
        .and_then(QuizKind::from_tag);
    if first_kind.is_none() {
        return Err(ParseError::UnrecognizedShape);
    }

    let total = elements.len();
    let records = elements
        .into_iter()
        .enumerate()
        .filter_map(|(idx, element)| {
            serde_json::from_value::<QuizRecord>(element)
                .inspect_err(|e| tracing::debug!("Skipping quiz element {}: {}", idx, e))
                .ok()
        })
        .collect::<Vec<_>>();

    if records.is_empty() {
        return Err(ParseError::UnrecognizedShape);
    }
    if records.len() < total {
        tracing::warn!(
            "Dropped {} of {} quiz questions with missing fields",
            total - records.len(),
            total
        );
    }

    Ok(records)
}
