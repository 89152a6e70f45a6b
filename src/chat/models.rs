//! Conversation history as it is stored and shown to the student.
use std::fmt;
use std::str::FromStr;

use anyhow::{Error, Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use crate::gemini::Role;
use crate::quiz::QuizRecord;

pub const DEFAULT_TITLE: &str = "Nouvelle conversation";

/// Stored in place of the text of a reply that was a quiz.
pub const QUIZ_MESSAGE_TEXT: &str = "Voici un petit test de connaissances :";

pub const WELCOME_MESSAGE: &str = "### Bonjour !\n\nJe suis **ADA**, votre assistante juridique spécialisée en Contentieux International.\n\nJe peux vous aider sur :\n- **La CIJ** et sa compétence\n- **La responsabilité internationale**\n- **La procédure** (arrêts, avis)\n\nUtilisez les boutons ci-dessous pour vous entraîner !";

const TITLE_MAX_CHARS: usize = 30;

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz: Option<Vec<QuizRecord>>,
}

impl Message {
    pub fn new(role: Role, text: &str) -> Self {
        Self {
            role,
            text: text.to_string(),
            timestamp: Utc::now(),
            quiz: None,
        }
    }

    /// A reply from the model that parsed as a quiz.
    pub fn quiz(questions: Vec<QuizRecord>) -> Self {
        Self {
            quiz: Some(questions),
            ..Self::new(Role::Model, QUIZ_MESSAGE_TEXT)
        }
    }

    pub fn is_quiz(&self) -> bool {
        self.quiz.is_some()
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
pub enum ChatMode {
    #[default]
    #[serde(rename = "TEXT")]
    Text,
    #[serde(rename = "VOICE")]
    Voice,
}

impl ChatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Voice => "VOICE",
        }
    }
}

impl fmt::Display for ChatMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ChatMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TEXT" => Ok(Self::Text),
            "VOICE" => Ok(Self::Voice),
            _ => Err(anyhow!("Unknown chat mode: {}", s)),
        }
    }
}

/// One line of what was said during a voice conversation.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct TranscriptLine {
    pub role: Role,
    pub text: String,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub transcripts: Vec<TranscriptLine>,
    /// Milliseconds since the epoch
    pub last_modified: i64,
    pub mode: ChatMode,
}

impl ChatSession {
    /// Text conversations open with the welcome message, voice
    /// conversations start empty.
    pub fn new(mode: ChatMode) -> Self {
        let messages = match mode {
            ChatMode::Text => vec![Message::new(Role::Model, WELCOME_MESSAGE)],
            ChatMode::Voice => vec![],
        };
        Self {
            id: Uuid::new_v4().to_string(),
            title: DEFAULT_TITLE.to_string(),
            messages,
            transcripts: vec![],
            last_modified: Utc::now().timestamp_millis(),
            mode,
        }
    }

    pub fn touch(&mut self) {
        self.last_modified = Utc::now().timestamp_millis();
    }

    /// Add a message, name the conversation after the student's first
    /// message if it still has the default title, and bump the
    /// modification time.
    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
        self.refresh_title();
        self.touch();
    }

    pub fn push_transcript(&mut self, role: Role, text: &str) {
        self.transcripts.push(TranscriptLine {
            role,
            text: text.to_string(),
        });
        self.touch();
    }

    fn refresh_title(&mut self) {
        if self.title != DEFAULT_TITLE || self.messages.len() <= 1 {
            return;
        }
        if let Some(first) = self.messages.iter().find(|m| m.role == Role::User) {
            self.title = truncate_title(&first.text);
        }
    }

    /// The flat `(role, text)` sequence of the conversation. Voice
    /// conversations are represented by their transcript.
    pub fn lines(&self) -> Vec<(Role, String)> {
        match self.mode {
            ChatMode::Text => self
                .messages
                .iter()
                .map(|m| (m.role, m.text.clone()))
                .collect(),
            ChatMode::Voice => self
                .transcripts
                .iter()
                .map(|t| (t.role, t.text.clone()))
                .collect(),
        }
    }
}

fn truncate_title(text: &str) -> String {
    let mut title = text.chars().take(TITLE_MAX_CHARS).collect::<String>();
    if text.chars().count() > TITLE_MAX_CHARS {
        title.push_str("...");
    }
    title
}
