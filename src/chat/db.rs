//! Where conversations are kept between runs.
use std::sync::RwLock;

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use tokio_rusqlite::{Connection, params};

use super::models::{ChatMode, ChatSession, Message, TranscriptLine};

/// Persistence for the conversation history. Orchestration code only
/// talks to storage through this trait.
///
/// Implementations must provide `load` and `save`. The other methods
/// have default implementations in terms of those two that stores can
/// override with something cheaper.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// All conversations, most recently modified first.
    async fn load(&self) -> Result<Vec<ChatSession>, Error>;

    /// Replace every stored conversation with `sessions`.
    async fn save(&self, sessions: &[ChatSession]) -> Result<(), Error>;

    async fn find(&self, id: &str) -> Result<Option<ChatSession>, Error> {
        Ok(self.load().await?.into_iter().find(|s| s.id == id))
    }

    async fn upsert(&self, session: &ChatSession) -> Result<(), Error> {
        let mut sessions = self.load().await?;
        match sessions.iter_mut().find(|s| s.id == session.id) {
            Some(existing) => *existing = session.clone(),
            None => sessions.push(session.clone()),
        }
        self.save(&sessions).await
    }

    /// Add `message` to the end of a conversation as one step, so an
    /// append is never lost to a concurrent write of the same
    /// conversation. Returns `None` if the conversation doesn't exist.
    async fn append_message(
        &self,
        id: &str,
        message: &Message,
    ) -> Result<Option<ChatSession>, Error> {
        let Some(mut session) = self.find(id).await? else {
            return Ok(None);
        };
        session.push(message.clone());
        self.upsert(&session).await?;
        Ok(Some(session))
    }

    /// Returns false if there was nothing to delete.
    async fn delete(&self, id: &str) -> Result<bool, Error> {
        let mut sessions = self.load().await?;
        let before = sessions.len();
        sessions.retain(|s| s.id != id);
        if sessions.len() == before {
            return Ok(false);
        }
        self.save(&sessions).await?;
        Ok(true)
    }
}

fn sort_by_recency(sessions: &mut [ChatSession]) {
    sessions.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
}

/// Keeps conversations for the lifetime of the process.
#[derive(Default)]
pub struct MemoryStore(RwLock<Vec<ChatSession>>);

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn load(&self) -> Result<Vec<ChatSession>, Error> {
        let mut sessions = self
            .0
            .read()
            .map_err(|e| anyhow!("Memory store lock poisoned: {}", e))?
            .clone();
        sort_by_recency(&mut sessions);
        Ok(sessions)
    }

    async fn save(&self, sessions: &[ChatSession]) -> Result<(), Error> {
        *self
            .0
            .write()
            .map_err(|e| anyhow!("Memory store lock poisoned: {}", e))? = sessions.to_vec();
        Ok(())
    }

    async fn append_message(
        &self,
        id: &str,
        message: &Message,
    ) -> Result<Option<ChatSession>, Error> {
        let mut sessions = self
            .0
            .write()
            .map_err(|e| anyhow!("Memory store lock poisoned: {}", e))?;
        let Some(session) = sessions.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        session.push(message.clone());
        Ok(Some(session.clone()))
    }
}

const MESSAGE_KIND: &str = "message";
const TRANSCRIPT_KIND: &str = "transcript";

// A session row before its messages are attached
struct SessionRow {
    id: String,
    title: String,
    mode: String,
    last_modified: i64,
}

// A chat_message row as serialized JSON
struct MessageRow {
    session_id: String,
    kind: String,
    data: String,
}

/// Stores conversations in the `session` and `chat_message` tables.
#[derive(Clone)]
pub struct SqliteStore {
    db: Connection,
}

impl SqliteStore {
    pub fn new(db: &Connection) -> Self {
        Self { db: db.clone() }
    }

    fn to_rows(session: &ChatSession) -> Result<Vec<(String, usize, String)>, Error> {
        let mut rows = Vec::with_capacity(session.messages.len() + session.transcripts.len());
        for (idx, msg) in session.messages.iter().enumerate() {
            rows.push((MESSAGE_KIND.to_string(), idx, serde_json::to_string(msg)?));
        }
        for (idx, line) in session.transcripts.iter().enumerate() {
            rows.push((TRANSCRIPT_KIND.to_string(), idx, serde_json::to_string(line)?));
        }
        Ok(rows)
    }

    fn assemble(sessions: Vec<SessionRow>, messages: Vec<MessageRow>) -> Result<Vec<ChatSession>> {
        let mut assembled = sessions
            .into_iter()
            .map(|row| {
                Ok(ChatSession {
                    id: row.id,
                    title: row.title,
                    messages: vec![],
                    transcripts: vec![],
                    last_modified: row.last_modified,
                    mode: row.mode.parse::<ChatMode>()?,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        for row in messages {
            let Some(session) = assembled.iter_mut().find(|s| s.id == row.session_id) else {
                tracing::warn!("Ignoring message for unknown session {}", row.session_id);
                continue;
            };
            if row.kind == TRANSCRIPT_KIND {
                session
                    .transcripts
                    .push(serde_json::from_str::<TranscriptLine>(&row.data)?);
            } else {
                session
                    .messages
                    .push(serde_json::from_str::<Message>(&row.data)?);
            }
        }

        sort_by_recency(&mut assembled);
        Ok(assembled)
    }

    async fn query(&self, id: Option<String>) -> Result<Vec<ChatSession>, Error> {
        let (sessions, messages) = self
            .db
            .call(move |conn| Ok(read_rows(conn, id.as_deref())?))
            .await?;

        Self::assemble(sessions, messages)
    }
}

// All conversations when `id` is `None`
fn read_rows(
    conn: &rusqlite::Connection,
    id: Option<&str>,
) -> Result<(Vec<SessionRow>, Vec<MessageRow>), rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT id, title, mode, last_modified FROM session WHERE ?1 IS NULL OR id = ?1",
    )?;
    let sessions = stmt
        .query_map(params![id], |row| {
            Ok(SessionRow {
                id: row.get(0)?,
                title: row.get(1)?,
                mode: row.get(2)?,
                last_modified: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, rusqlite::Error>>()?;

    let mut stmt = conn.prepare(
        r#"
        SELECT session_id, kind, data FROM chat_message
        WHERE ?1 IS NULL OR session_id = ?1
        ORDER BY session_id, kind, position
        "#,
    )?;
    let messages = stmt
        .query_map(params![id], |row| {
            Ok(MessageRow {
                session_id: row.get(0)?,
                kind: row.get(1)?,
                data: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, rusqlite::Error>>()?;

    Ok((sessions, messages))
}

fn db_error(err: Error) -> tokio_rusqlite::Error {
    tokio_rusqlite::Error::Other(err.into())
}

fn write_session(
    tx: &rusqlite::Transaction,
    session: &ChatSession,
    rows: &[(String, usize, String)],
) -> Result<(), rusqlite::Error> {
    tx.execute(
        r#"
        INSERT INTO session (id, title, mode, last_modified) VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            mode = excluded.mode,
            last_modified = excluded.last_modified
        "#,
        params![
            session.id,
            session.title,
            session.mode.as_str(),
            session.last_modified
        ],
    )?;
    tx.execute(
        "DELETE FROM chat_message WHERE session_id = ?1",
        params![session.id],
    )?;
    let mut stmt = tx.prepare(
        "INSERT INTO chat_message (session_id, kind, position, data) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (kind, position, data) in rows {
        stmt.execute(params![session.id, kind, *position as i64, data])?;
    }
    Ok(())
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn load(&self) -> Result<Vec<ChatSession>, Error> {
        self.query(None).await
    }

    async fn save(&self, sessions: &[ChatSession]) -> Result<(), Error> {
        let batch = sessions
            .iter()
            .map(|s| Ok((s.clone(), Self::to_rows(s)?)))
            .collect::<Result<Vec<_>, Error>>()?;

        self.db
            .call(move |conn| {
                // Either every conversation is replaced or none are
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM chat_message", [])?;
                tx.execute("DELETE FROM session", [])?;
                for (session, rows) in &batch {
                    write_session(&tx, session, rows)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn find(&self, id: &str) -> Result<Option<ChatSession>, Error> {
        Ok(self.query(Some(id.to_string())).await?.into_iter().next())
    }

    async fn upsert(&self, session: &ChatSession) -> Result<(), Error> {
        let rows = Self::to_rows(session)?;
        let session = session.clone();
        self.db
            .call(move |conn| {
                let tx = conn.transaction()?;
                write_session(&tx, &session, &rows)?;
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn append_message(
        &self,
        id: &str,
        message: &Message,
    ) -> Result<Option<ChatSession>, Error> {
        let id = id.to_string();
        let message = message.clone();
        let session = self
            .db
            .call(move |conn| {
                // Read and write in one transaction on the connection's
                // thread so no other write can land in between
                let tx = conn.transaction()?;
                let (sessions, messages) = read_rows(&tx, Some(&id))?;
                let Some(mut session) = Self::assemble(sessions, messages)
                    .map_err(db_error)?
                    .pop()
                else {
                    return Ok(None);
                };
                session.push(message);
                let rows = Self::to_rows(&session).map_err(db_error)?;
                write_session(&tx, &session, &rows)?;
                tx.commit()?;
                Ok(Some(session))
            })
            .await?;
        Ok(session)
    }

    async fn delete(&self, id: &str) -> Result<bool, Error> {
        let id = id.to_string();
        let deleted = self
            .db
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM chat_message WHERE session_id = ?1", params![id])?;
                let deleted = tx.execute("DELETE FROM session WHERE id = ?1", params![id])?;
                tx.commit()?;
                Ok(deleted)
            })
            .await?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::chat::models::Role;
    use crate::core::db::initialize_db;
    use crate::quiz::ChoiceQuestion;
    use crate::quiz::QuizRecord;

    async fn sqlite_store() -> SqliteStore {
        let db = Connection::open_in_memory().await.unwrap();
        db.call(|conn| {
            initialize_db(conn)?;
            Ok(())
        })
        .await
        .unwrap();
        SqliteStore::new(&db)
    }

    fn sample_session(last_modified: i64) -> ChatSession {
        let mut session = ChatSession::new(ChatMode::Text);
        session.push(Message::new(Role::User, "L'affaire Mavrommatis"));
        session.push(Message::quiz(vec![QuizRecord::MultipleChoice(
            ChoiceQuestion::new("Q?", vec!["A".into(), "B".into()], 1, "E").unwrap(),
        )]));
        session.last_modified = last_modified;
        session
    }

    async fn exercise_store(store: &dyn ConversationStore) {
        assert!(store.load().await.unwrap().is_empty());

        let older = sample_session(1_000);
        let mut newer = ChatSession::new(ChatMode::Voice);
        newer.push_transcript(Role::User, "Allô");
        newer.last_modified = 2_000;

        store.save(&[older.clone(), newer.clone()]).await.unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, vec![newer.clone(), older.clone()]);

        assert_eq!(store.find(&older.id).await.unwrap(), Some(older.clone()));
        assert_eq!(store.find("missing").await.unwrap(), None);

        let mut renamed = older.clone();
        renamed.title = "Révisions".to_string();
        renamed.last_modified = 3_000;
        store.upsert(&renamed).await.unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], renamed);

        assert!(store.delete(&newer.id).await.unwrap());
        assert!(!store.delete(&newer.id).await.unwrap());
        assert_eq!(store.load().await.unwrap(), vec![renamed]);
    }

    #[tokio::test]
    async fn test_memory_store() {
        exercise_store(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_sqlite_store() {
        exercise_store(&sqlite_store().await).await;
    }

    #[tokio::test]
    async fn test_sqlite_preserves_message_order() {
        let store = sqlite_store().await;
        let mut session = ChatSession::new(ChatMode::Text);
        for i in 0..12 {
            session.push(Message::new(Role::User, &format!("Message {}", i)));
        }
        store.upsert(&session).await.unwrap();

        let loaded = store.find(&session.id).await.unwrap().unwrap();
        let texts = loaded.messages.iter().map(|m| m.text.as_str()).collect::<Vec<_>>();
        assert_eq!(texts[1], "Message 0");
        assert_eq!(texts[12], "Message 11");
    }

    #[tokio::test]
    async fn test_append_message() {
        for store in [
            Arc::new(MemoryStore::new()) as Arc<dyn ConversationStore>,
            Arc::new(sqlite_store().await),
        ] {
            let session = ChatSession::new(ChatMode::Text);
            store.upsert(&session).await.unwrap();

            let updated = store
                .append_message(&session.id, &Message::new(Role::User, "Première question"))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(updated.messages.len(), 2);
            assert_eq!(updated.title, "Première question");
            assert_eq!(store.find(&session.id).await.unwrap(), Some(updated));

            let missing = store
                .append_message("missing", &Message::new(Role::User, "?"))
                .await
                .unwrap();
            assert!(missing.is_none());
        }
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_not_lost() {
        let store = sqlite_store().await;
        let session = ChatSession::new(ChatMode::Text);
        store.upsert(&session).await.unwrap();

        let messages = (0..10)
            .map(|i| Message::new(Role::User, &format!("Message {}", i)))
            .collect::<Vec<_>>();
        let results = futures::future::join_all(
            messages
                .iter()
                .map(|msg| store.append_message(&session.id, msg)),
        )
        .await;
        assert!(results.iter().all(|r| r.is_ok()));

        let stored = store.find(&session.id).await.unwrap().unwrap();
        assert_eq!(stored.messages.len(), 11);
    }
}
