use std::sync::Arc;

use crate::chat::{SqliteStore, Tutor};
use crate::core::AppConfig;

pub struct AppState {
    pub tutor: Arc<Tutor>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(db: tokio_rusqlite::Connection, config: AppConfig) -> Self {
        let tutor = Tutor::builder(
            &config.gemini_api_hostname,
            &config.gemini_api_key,
            &config.model,
        )
        .system_instruction(&config.system_message)
        .store(Arc::new(SqliteStore::new(&db)))
        .build();

        Self {
            tutor: Arc::new(tutor),
            config,
        }
    }
}
