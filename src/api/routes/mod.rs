//! API routes module

pub mod chat;
pub mod quiz;
pub mod speech;

use std::sync::{Arc, RwLock};

use crate::api::state::AppState;
use axum::Router;

type SharedState = Arc<RwLock<AppState>>;

/// Create the combined API router
pub fn router() -> Router<SharedState> {
    Router::new()
        // Conversations and streamed replies
        .nest("/chat", chat::router())
        // Quiz scoring and case study grading
        .nest("/quiz", quiz::router())
        // Text to speech
        .nest("/speech", speech::router())
}
