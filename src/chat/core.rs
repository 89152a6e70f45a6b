use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Error, Result, anyhow, bail};
use tokio::sync::Mutex as WriteLock;

use super::db::{ConversationStore, MemoryStore};
use super::models::{ChatMode, ChatSession, Message, Role};
use crate::ai::prompt::QUIZ_REQUEST;
use crate::attachment::Attachment;
use crate::gemini::{self, Content, Part};
use crate::stream::{Generation, Outcome, SessionUpdate, drive_stream};

/// The tutor behind every conversation: sends the student's messages
/// to the model with the course instruction, streams the reply,
/// decides between prose and quiz, and keeps the history.
///
/// Only the latest request of each conversation is answered. Sending
/// a new message while a reply is still streaming abandons the old
/// reply, which is then neither rendered nor stored.
///
/// Use `Tutor::builder()` to construct a valid `Tutor`.
pub struct Tutor {
    api_hostname: String,
    api_key: String,
    model: String,
    system_instruction: Option<String>,
    store: Arc<dyn ConversationStore>,
    conversations: Mutex<HashMap<String, Conversation>>,
}

/// Per conversation bookkeeping. Every change to a stored conversation
/// holds `writes`, and requests take their ticket from `generation`
/// while holding it.
#[derive(Clone, Default)]
struct Conversation {
    generation: Generation,
    writes: Arc<WriteLock<()>>,
}

impl Tutor {
    pub fn builder(api_hostname: &str, api_key: &str, model: &str) -> TutorBuilder {
        TutorBuilder::new(api_hostname, api_key, model)
    }

    pub fn store(&self) -> Arc<dyn ConversationStore> {
        Arc::clone(&self.store)
    }

    pub async fn create_session(&self, mode: ChatMode) -> Result<ChatSession, Error> {
        let session = ChatSession::new(mode);
        self.store.upsert(&session).await?;
        tracing::debug!("Created {} session {}", mode, session.id);
        Ok(session)
    }

    /// Most recently modified first.
    pub async fn list_sessions(&self) -> Result<Vec<ChatSession>, Error> {
        self.store.load().await
    }

    pub async fn load_session(&self, id: &str) -> Result<Option<ChatSession>, Error> {
        self.store.find(id).await
    }

    pub async fn rename_session(&self, id: &str, title: &str) -> Result<Option<ChatSession>, Error> {
        let conversation = self.conversation(id)?;
        let _writing = conversation.writes.lock().await;
        let Some(mut session) = self.store.find(id).await? else {
            return Ok(None);
        };
        session.title = title.trim().to_string();
        self.store.upsert(&session).await?;
        Ok(Some(session))
    }

    pub async fn delete_session(&self, id: &str) -> Result<bool, Error> {
        let conversation = self.conversation(id)?;
        let _writing = conversation.writes.lock().await;
        // Any reply still streaming is dropped
        conversation.generation.begin();
        let deleted = self.store.delete(id).await?;
        self.conversations()?.remove(id);
        Ok(deleted)
    }

    /// Record a line said during a voice conversation.
    pub async fn add_transcript(&self, id: &str, role: Role, text: &str) -> Result<ChatSession> {
        let conversation = self.conversation(id)?;
        let _writing = conversation.writes.lock().await;
        let mut session = self.find_or_fail(id).await?;
        if session.mode != ChatMode::Voice {
            bail!("Session {} is not a voice session", id);
        }
        session.push_transcript(role, text);
        self.store.upsert(&session).await?;
        Ok(session)
    }

    /// Send the student's message and stream the reply to `on_update`.
    ///
    /// Returns the reply as stored in the conversation, or `None` when
    /// there was nothing to send or the reply was superseded by a newer
    /// request. A failed request is not an error, the reply is the
    /// generic error message.
    pub async fn send_message<F>(
        &self,
        session_id: &str,
        text: &str,
        attachment: Option<Attachment>,
        on_update: F,
    ) -> Result<Option<Message>, Error>
    where
        F: FnMut(&SessionUpdate) + Send,
    {
        if text.trim().is_empty() && attachment.is_none() {
            return Ok(None);
        }

        let conversation = self.conversation(session_id)?;
        let (contents, ticket) = {
            let _writing = conversation.writes.lock().await;
            let session = self.find_or_fail(session_id).await?;

            // Only the text goes in the history, files are sent once
            let mut contents = history(&session.messages);
            let mut parts = Vec::new();
            if let Some(attachment) = &attachment {
                parts.push(attachment.to_part());
            }
            if !text.trim().is_empty() {
                parts.push(Part::text(text));
            }
            contents.push(Content::new(Role::User, parts));

            let recorded = match &attachment {
                Some(a) => a.label(text),
                None => text.to_string(),
            };
            self.append_or_fail(session_id, Message::new(Role::User, &recorded))
                .await?;
            (contents, conversation.generation.begin())
        };

        let chunks = gemini::generate_stream(
            contents,
            self.system_instruction.clone(),
            &self.api_hostname,
            &self.api_key,
            &self.model,
        );

        let Some(mut stream_session) = drive_stream(chunks, &ticket, on_update).await else {
            tracing::info!("Dropping superseded reply in session {}", session_id);
            return Ok(None);
        };
        let reply = match stream_session.finish() {
            Outcome::Prose { text } => Message::new(Role::Model, text),
            Outcome::Quiz { questions } => Message::quiz(questions.clone()),
            Outcome::Failed { text } => Message::new(Role::Model, text),
        };

        let _writing = conversation.writes.lock().await;
        // A newer request may have started after the stream ended
        if !ticket.is_current() {
            tracing::info!("Dropping superseded reply in session {}", session_id);
            return Ok(None);
        }
        self.append_or_fail(session_id, reply.clone()).await?;

        Ok(Some(reply))
    }

    /// Ask for a quiz in the current conversation.
    pub async fn start_quiz<F>(&self, session_id: &str, on_update: F) -> Result<Option<Message>, Error>
    where
        F: FnMut(&SessionUpdate) + Send,
    {
        self.send_message(session_id, QUIZ_REQUEST, None, on_update)
            .await
    }

    async fn find_or_fail(&self, id: &str) -> Result<ChatSession, Error> {
        self.store
            .find(id)
            .await?
            .ok_or(anyhow!("Chat session {} not found", id))
    }

    async fn append_or_fail(&self, id: &str, message: Message) -> Result<ChatSession, Error> {
        self.store
            .append_message(id, &message)
            .await?
            .ok_or(anyhow!("Chat session {} not found", id))
    }

    fn conversations(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, Conversation>>, Error> {
        self.conversations
            .lock()
            .map_err(|e| anyhow!("Conversation lock poisoned: {}", e))
    }

    fn conversation(&self, session_id: &str) -> Result<Conversation, Error> {
        Ok(self
            .conversations()?
            .entry(session_id.to_string())
            .or_default()
            .clone())
    }
}

/// The conversation so far as model contents. The service expects the
/// first turn to be the user's so the welcome message is left out.
fn history(messages: &[Message]) -> Vec<Content> {
    messages
        .iter()
        .skip_while(|m| m.role == Role::Model)
        .map(|m| {
            let text = match &m.quiz {
                // Let the model see the questions it asked
                Some(questions) => serde_json::to_string(questions).unwrap_or(m.text.clone()),
                None => m.text.clone(),
            };
            Content::new(m.role, vec![Part::text(&text)])
        })
        .collect()
}

pub struct TutorBuilder {
    api_hostname: String,
    api_key: String,
    model: String,
    system_instruction: Option<String>,
    store: Option<Arc<dyn ConversationStore>>,
}

impl TutorBuilder {
    pub fn new(api_hostname: &str, api_key: &str, model: &str) -> Self {
        Self {
            api_hostname: api_hostname.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            system_instruction: None,
            store: None,
        }
    }

    /// Defaults to an in-memory store.
    pub fn build(self) -> Tutor {
        Tutor {
            api_hostname: self.api_hostname,
            api_key: self.api_key,
            model: self.model,
            system_instruction: self.system_instruction,
            store: self
                .store
                .unwrap_or_else(|| Arc::new(MemoryStore::new())),
            conversations: Mutex::new(HashMap::new()),
        }
    }

    pub fn system_instruction(mut self, instruction: &str) -> Self {
        if !instruction.trim().is_empty() {
            self.system_instruction = Some(instruction.to_string());
        }
        self
    }

    pub fn store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        self.store = Some(store);
        self
    }
}
