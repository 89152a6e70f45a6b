//! Drains a sequence of reply chunks into a `StreamSession`.
//!
//! Only the most recent request of a conversation is rendered. Each
//! request takes a `Ticket` from the conversation's `Generation` and
//! stops consuming chunks as soon as a newer request has started.
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use futures::{Stream, StreamExt};

use super::session::{SessionUpdate, StreamSession};

/// Counts the requests made in one conversation.
#[derive(Clone, Debug, Default)]
pub struct Generation(Arc<AtomicU64>);

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request. Any request started before it is superseded.
    pub fn begin(&self) -> Ticket {
        let id = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        Ticket {
            id,
            generation: self.clone(),
        }
    }
}

#[derive(Debug)]
pub struct Ticket {
    id: u64,
    generation: Generation,
}

impl Ticket {
    pub fn is_current(&self) -> bool {
        self.generation.0.load(Ordering::SeqCst) == self.id
    }
}

/// Feed every chunk of a complete reply through a new session.
pub fn drive<I, F>(chunks: I, mut on_update: F) -> StreamSession
where
    I: IntoIterator,
    I::Item: AsRef<str>,
    F: FnMut(&SessionUpdate),
{
    let mut session = StreamSession::new();
    for chunk in chunks {
        session.append(chunk.as_ref());
        on_update(&session.update());
    }
    session.finish();
    on_update(&session.update());
    session
}

/// Feed a streamed reply through a new session as chunks arrive.
///
/// An `Err` item is a transport failure and ends the session in the
/// failed state. Returns `None` if the request was superseded, in
/// which case the remaining chunks are ignored and nothing should be
/// rendered or stored.
pub async fn drive_stream<S, F>(
    mut chunks: S,
    ticket: &Ticket,
    mut on_update: F,
) -> Option<StreamSession>
where
    S: Stream<Item = Result<String>> + Unpin,
    F: FnMut(&SessionUpdate),
{
    let mut session = StreamSession::new();
    on_update(&session.update());

    while let Some(chunk) = chunks.next().await {
        if !ticket.is_current() {
            tracing::debug!(
                "Reply superseded by a newer request after {} chunks",
                session.chunk_count()
            );
            return None;
        }
        match chunk {
            Ok(text) => {
                session.append(&text);
                on_update(&session.update());
            }
            Err(e) => {
                tracing::error!("Reply stream failed: {}. Root cause: {}", e, e.root_cause());
                session.fail();
                on_update(&session.update());
                return Some(session);
            }
        }
    }

    if !ticket.is_current() {
        return None;
    }
    session.finish();
    on_update(&session.update());
    Some(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::session::{Outcome, TerminalState};
    use anyhow::anyhow;
    use futures::stream;

    #[test]
    fn test_tickets_are_superseded() {
        let generation = Generation::new();
        let first = generation.begin();
        assert!(first.is_current());

        let second = generation.begin();
        assert!(!first.is_current());
        assert!(second.is_current());

        // Clones share the same counter
        let third = generation.clone().begin();
        assert!(!second.is_current());
        assert!(third.is_current());
    }

    #[test]
    fn test_drive_prose() {
        let mut previews = Vec::new();
        let session = drive(["Bonjour, ", "voici ma réponse."], |update| {
            if let SessionUpdate::Preview { text } = update {
                previews.push(text.clone());
            }
        });
        assert_eq!(previews, vec!["Bonjour, ", "Bonjour, voici ma réponse."]);
        assert_eq!(session.terminal(), TerminalState::Prose);
    }

    #[test]
    fn test_drive_quiz_never_previews() {
        let mut updates = Vec::new();
        let session = drive(
            [
                "[{\"type\":\"mcq\",",
                "\"question\":\"Q?\",\"options\":[\"A\",\"B\"],\"correctAnswerIndex\":0,\"explanation\":\"E\"}]",
            ],
            |update| updates.push(update.clone()),
        );
        assert_eq!(session.terminal(), TerminalState::Quiz);
        assert!(
            !updates
                .iter()
                .any(|u| matches!(u, SessionUpdate::Preview { .. }))
        );
        assert!(matches!(
            updates.last(),
            Some(SessionUpdate::Done {
                outcome: Outcome::Quiz { .. }
            })
        ));
    }

    #[tokio::test]
    async fn test_drive_stream() {
        let generation = Generation::new();
        let ticket = generation.begin();
        let chunks = stream::iter(vec![Ok("Bonjour, ".to_string()), Ok("ADA".to_string())]);

        let session = drive_stream(chunks, &ticket, |_| {}).await.unwrap();
        assert_eq!(session.terminal(), TerminalState::Prose);
        assert_eq!(session.buffer(), "Bonjour, ADA");
    }

    #[tokio::test]
    async fn test_drive_stream_transport_failure() {
        let generation = Generation::new();
        let ticket = generation.begin();
        let chunks = stream::iter(vec![
            Ok("[{\"type\"".to_string()),
            Err(anyhow!("connection reset")),
            Ok("never read".to_string()),
        ]);

        let mut last = None;
        let session = drive_stream(chunks, &ticket, |u| last = Some(u.clone()))
            .await
            .unwrap();
        assert_eq!(session.terminal(), TerminalState::Failed);
        assert_eq!(session.chunk_count(), 1);
        assert!(matches!(
            last,
            Some(SessionUpdate::Done {
                outcome: Outcome::Failed { .. }
            })
        ));
    }

    #[tokio::test]
    async fn test_drive_stream_superseded() {
        let generation = Generation::new();
        let ticket = generation.begin();
        let newer = generation.clone();

        let mut seen = 0;
        let chunks = stream::iter(vec![Ok("Un".to_string()), Ok("Deux".to_string())]);
        let result = drive_stream(chunks, &ticket, |update| {
            if let SessionUpdate::Preview { .. } = update {
                seen += 1;
                // A new request arrives while the first is streaming
                newer.begin();
            }
        })
        .await;

        assert!(result.is_none());
        assert_eq!(seen, 1);
    }
}
