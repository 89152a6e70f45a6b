//! Public types for the chat API
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::{ChatMode, ChatSession, Message, Role, TranscriptLine};
use crate::markdown::render_html;
use crate::quiz::QuizRecord;

#[derive(Deserialize)]
pub struct AttachmentPayload {
    pub file_name: String,
    pub mime_type: Option<String>,
    /// Base64, optionally as a `data:` URL
    pub data: String,
}

#[derive(Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    #[serde(default)]
    pub message: String,
    /// Ask for a quiz instead of sending `message`
    #[serde(default)]
    pub quiz: bool,
    pub attachment: Option<AttachmentPayload>,
}

#[derive(Deserialize)]
pub struct ChatSessionsQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Deserialize, Default)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub mode: ChatMode,
}

#[derive(Deserialize)]
pub struct RenameSessionRequest {
    pub title: String,
}

#[derive(Deserialize)]
pub struct TranscriptRequest {
    pub role: Role,
    pub text: String,
}

/// A session in the list, without its messages.
#[derive(Serialize, Clone)]
pub struct ChatSessionSummary {
    pub id: String,
    pub title: String,
    pub mode: ChatMode,
    pub last_modified: i64,
    pub message_count: usize,
}

impl From<&ChatSession> for ChatSessionSummary {
    fn from(session: &ChatSession) -> Self {
        Self {
            id: session.id.clone(),
            title: session.title.clone(),
            mode: session.mode,
            last_modified: session.last_modified,
            message_count: session.messages.len(),
        }
    }
}

#[derive(Serialize)]
pub struct ChatSessionsResponse {
    pub sessions: Vec<ChatSessionSummary>,
    pub page: usize,
    pub limit: usize,
    pub total_sessions: usize,
    pub total_pages: usize,
}

/// A message with its text rendered for display.
#[derive(Serialize)]
pub struct MessageView {
    pub role: Role,
    pub text: String,
    pub html: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiz: Option<Vec<QuizRecord>>,
}

impl From<Message> for MessageView {
    fn from(msg: Message) -> Self {
        Self {
            html: render_html(&msg.text),
            role: msg.role,
            text: msg.text,
            timestamp: msg.timestamp,
            quiz: msg.quiz,
        }
    }
}

#[derive(Serialize)]
pub struct ChatSessionResponse {
    pub id: String,
    pub title: String,
    pub mode: ChatMode,
    pub last_modified: i64,
    pub messages: Vec<MessageView>,
    pub transcripts: Vec<TranscriptLine>,
}

impl From<ChatSession> for ChatSessionResponse {
    fn from(session: ChatSession) -> Self {
        Self {
            id: session.id,
            title: session.title,
            mode: session.mode,
            last_modified: session.last_modified,
            messages: session.messages.into_iter().map(MessageView::from).collect(),
            transcripts: session.transcripts,
        }
    }
}
