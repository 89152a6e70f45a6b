//! Router for the quiz API

use std::sync::{Arc, RwLock};

use anyhow::Result;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};

use super::public;
use crate::api::public::ApiError;
use crate::api::state::AppState;
use crate::quiz::{QuizAttempt, QuizRecord, Verdict, grade_case_study};

type SharedState = Arc<RwLock<AppState>>;

/// Grade the answer to a case study
async fn grade(
    State(state): State<SharedState>,
    axum::Json(payload): axum::Json<public::GradeRequest>,
) -> Result<Response, ApiError> {
    let QuizRecord::CaseStudy(question) = payload.question else {
        return Ok((StatusCode::BAD_REQUEST, "Only case studies are graded").into_response());
    };
    if payload.answer.trim().is_empty() {
        return Ok((StatusCode::BAD_REQUEST, "Answer can't be empty").into_response());
    }

    let (api_hostname, api_key, model) = {
        let shared_state = state.read().expect("Unable to read share state");
        (
            shared_state.config.gemini_api_hostname.clone(),
            shared_state.config.gemini_api_key.clone(),
            shared_state.config.model.clone(),
        )
    };
    let verdict =
        grade_case_study(&question, &payload.answer, &api_hostname, &api_key, &model).await?;

    Ok(axum::Json(verdict).into_response())
}

fn run_attempt(payload: public::ScoreRequest) -> Result<public::ScoreResponse> {
    let mut attempt = QuizAttempt::new(payload.questions);
    let mut results = Vec::with_capacity(payload.answers.len());
    for answer in payload.answers {
        let correct = match answer {
            public::QuizAnswer::Choice(idx) => attempt.answer_choice(idx)?,
            public::QuizAnswer::Graded { correct } => {
                attempt.record_verdict(&Verdict {
                    correct,
                    feedback: String::new(),
                })?;
                correct
            }
        };
        results.push(correct);
        attempt.next()?;
    }
    let score = attempt.score();

    Ok(public::ScoreResponse {
        correct: score.correct,
        total: score.total,
        feedback: score.feedback().to_string(),
        results,
    })
}

/// Score a completed quiz
async fn score(axum::Json(payload): axum::Json<public::ScoreRequest>) -> Response {
    if payload.answers.len() != payload.questions.len() {
        return (
            StatusCode::BAD_REQUEST,
            "Every question needs exactly one answer",
        )
            .into_response();
    }
    match run_attempt(payload) {
        Ok(resp) => axum::Json(resp).into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}

/// Create the quiz router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/grade", post(grade))
        .route("/score", post(score))
}
