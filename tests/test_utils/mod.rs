//! Test utilities for integration tests
use std::fs;
use std::sync::{Arc, RwLock};

use axum::{Router, body::Body};

use ada::api::AppState;
use ada::api::app;
use ada::core::AppConfig;
use ada::core::db::async_db;
use ada::core::db::initialize_db;

/// Creates a test application router backed by a fresh database in a
/// temporary directory. Gemini calls go to `gemini_api_hostname`,
/// usually a `mockito` server.
pub async fn test_app_with_host(gemini_api_hostname: &str) -> Router {
    let dir = tempfile::tempdir()
        .expect("Failed to create base directory")
        .keep();
    let db_path = dir.join("db");
    fs::create_dir_all(&db_path).expect("Failed to create db directory");
    let db_path_str = db_path.to_str().unwrap();

    let db = async_db(db_path_str)
        .await
        .expect("Failed to connect to async db");
    db.call(|conn| {
        initialize_db(conn).expect("Failed to migrate db");
        Ok(())
    })
    .await
    .unwrap();

    let app_config = AppConfig {
        storage_path: dir.display().to_string(),
        db_path: db_path_str.to_string(),
        gemini_api_hostname: gemini_api_hostname.to_string(),
        gemini_api_key: String::from("test-api-key"),
        model: String::from("gemini-test"),
        tts_model: String::from("tts-test"),
        tts_voice: String::from("Kore"),
        system_message: String::from("Tu es ADA."),
    };
    let app_state = AppState::new(db, app_config);
    app(Arc::new(RwLock::new(app_state)))
}

/// Creates a test application that never reaches a real model.
pub async fn test_app() -> Router {
    test_app_with_host("http://127.0.0.1:9").await
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body is not utf-8")
}

pub async fn body_to_json(body: Body) -> serde_json::Value {
    serde_json::from_str(&body_to_string(body).await).expect("Body is not json")
}

/// A streamed Gemini reply split into `chunks`.
pub fn sse_body(chunks: &[&str]) -> String {
    chunks
        .iter()
        .map(|text| {
            let event = serde_json::json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
            });
            format!("data: {}\r\n\r\n", event)
        })
        .collect()
}
