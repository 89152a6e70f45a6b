//! Router for the chat API

use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, sse::Event, sse::KeepAlive, sse::Sse},
    routing::{get, post},
};
use tokio::sync::mpsc;
use tokio_stream::StreamExt as _;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::public;
use crate::ai::prompt::QUIZ_REQUEST;
use crate::api::public::ApiError;
use crate::api::state::AppState;
use crate::attachment::Attachment;
use crate::chat::Tutor;
use crate::export::{export_file_name, export_now};
use crate::stream::SessionUpdate;

type SharedState = Arc<RwLock<AppState>>;

fn tutor(state: &SharedState) -> Arc<Tutor> {
    Arc::clone(&state.read().expect("Unable to read share state").tutor)
}

fn not_found(id: &str) -> axum::response::Response {
    (
        StatusCode::NOT_FOUND,
        format!("Chat session {} not found", id),
    )
        .into_response()
}

/// Get a single chat session by ID
async fn chat_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(session) = tutor(&state).load_session(&id).await? else {
        return Ok(not_found(&id));
    };
    Ok(axum::Json(public::ChatSessionResponse::from(session)).into_response())
}

/// Get a page of chat sessions, most recent first
async fn chat_list(
    State(state): State<SharedState>,
    Query(params): Query<public::ChatSessionsQuery>,
) -> Result<axum::Json<public::ChatSessionsResponse>, ApiError> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(20).max(1);
    let sessions = tutor(&state).list_sessions().await?;
    let total_sessions = sessions.len();

    Ok(axum::Json(public::ChatSessionsResponse {
        sessions: sessions
            .iter()
            .skip((page - 1) * limit)
            .take(limit)
            .map(public::ChatSessionSummary::from)
            .collect(),
        page,
        limit,
        total_sessions,
        total_pages: total_sessions.div_ceil(limit),
    }))
}

/// Start a new conversation
async fn create_session(
    State(state): State<SharedState>,
    payload: Option<axum::Json<public::CreateSessionRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let mode = payload.map(|p| p.0.mode).unwrap_or_default();
    let session = tutor(&state).create_session(mode).await?;
    Ok((
        StatusCode::CREATED,
        axum::Json(public::ChatSessionResponse::from(session)),
    ))
}

async fn rename_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    axum::Json(payload): axum::Json<public::RenameSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.title.trim().is_empty() {
        return Ok((StatusCode::BAD_REQUEST, "Title can't be empty").into_response());
    }
    let Some(session) = tutor(&state).rename_session(&id, &payload.title).await? else {
        return Ok(not_found(&id));
    };
    Ok(axum::Json(public::ChatSessionResponse::from(session)).into_response())
}

async fn delete_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if tutor(&state).delete_session(&id).await? {
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Ok(not_found(&id))
    }
}

/// Append a line to the transcript of a voice conversation
async fn add_transcript(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    axum::Json(payload): axum::Json<public::TranscriptRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tutor = tutor(&state);
    if tutor.load_session(&id).await?.is_none() {
        return Ok(not_found(&id));
    }
    let session = tutor
        .add_transcript(&id, payload.role, &payload.text)
        .await?;
    Ok(axum::Json(public::ChatSessionResponse::from(session)).into_response())
}

/// Download the conversation as a text document
async fn export_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(session) = tutor(&state).load_session(&id).await? else {
        return Ok(not_found(&id));
    };
    let doc = export_now(&session.title, &session.lines());
    let disposition = format!(
        "attachment; filename=\"{}\"",
        export_file_name(&chrono::Local::now())
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        doc,
    )
        .into_response())
}

/// Send a message (or ask for a quiz) and stream the reply as server
/// sent events. Each event is a JSON `SessionUpdate`. A reply that runs
/// to completion ends with `done`. If a newer message to the same
/// session supersedes it, or storing the message fails, the stream
/// closes without a `done` event.
async fn chat_handler(
    State(state): State<SharedState>,
    axum::Json(payload): axum::Json<public::ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tutor = tutor(&state);
    let session_id = payload.session_id;

    if tutor.load_session(&session_id).await?.is_none() {
        return Ok(not_found(&session_id));
    }

    // A bad attachment means the message is not sent at all
    let attachment = match payload.attachment {
        Some(a) => match Attachment::from_base64(&a.file_name, a.mime_type.as_deref(), &a.data) {
            Ok(attachment) => Some(attachment),
            Err(e) => {
                tracing::warn!("Rejected attachment {}: {}", a.file_name, e);
                return Ok((StatusCode::BAD_REQUEST, e.to_string()).into_response());
            }
        },
        None => None,
    };
    let message = if payload.quiz {
        QUIZ_REQUEST.to_string()
    } else {
        payload.message
    };
    if message.trim().is_empty() && attachment.is_none() {
        return Ok((StatusCode::BAD_REQUEST, "Message can't be empty").into_response());
    }

    let (tx, rx) = mpsc::unbounded_channel::<SessionUpdate>();
    let sse_stream = UnboundedReceiverStream::new(rx).map(|update| Event::default().json_data(update));

    tokio::spawn(async move {
        let result = tutor
            .send_message(&session_id, &message, attachment, |update| {
                // The client may have gone away, the reply is still stored
                let _ = tx.send(update.clone());
            })
            .await;
        if let Err(e) = result {
            tracing::error!("Chat handler error: {}. Root cause: {}", e, e.root_cause());
        }
    });

    let resp = Sse::new(sse_stream)
        .keep_alive(
            KeepAlive::default()
                .text("keep-alive")
                .interval(Duration::from_secs(15)),
        )
        .into_response();

    Ok(resp)
}

/// Create the chat router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", post(chat_handler))
        .route("/sessions", get(chat_list).post(create_session))
        .route(
            "/sessions/{id}",
            get(chat_session).patch(rename_session).delete(delete_session),
        )
        .route("/sessions/{id}/transcripts", post(add_transcript))
        .route("/sessions/{id}/export", get(export_session))
}
