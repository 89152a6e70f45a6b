use anyhow::{Error, Result};
use tokio_rusqlite::Connection;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS session (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    mode TEXT NOT NULL DEFAULT 'TEXT',
    last_modified INTEGER NOT NULL
);

-- Both chat messages and voice transcript lines, distinguished by
-- `kind` and ordered by `position` within a session
CREATE TABLE IF NOT EXISTS chat_message (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    kind TEXT NOT NULL DEFAULT 'message',
    position INTEGER NOT NULL,
    data TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS chat_message_session_idx
    ON chat_message (session_id, kind, position);
"#;

/// Open the database in the directory `db_path`.
pub async fn async_db(db_path: &str) -> Result<Connection, Error> {
    let path = format!("{}/ada.sqlite", db_path.trim_end_matches('/'));
    let db = Connection::open(path).await?;
    Ok(db)
}

/// Create the tables if they don't exist yet. Safe to run on every start.
pub fn initialize_db(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA)
}
