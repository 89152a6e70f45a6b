mod core;
pub mod db;
pub mod models;

pub use self::core::{Tutor, TutorBuilder};
pub use db::{ConversationStore, MemoryStore, SqliteStore};
pub use models::{
    ChatMode, ChatSession, DEFAULT_TITLE, Message, QUIZ_MESSAGE_TEXT, Role, TranscriptLine,
    WELCOME_MESSAGE,
};
