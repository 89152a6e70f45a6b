//! Router for the speech API

use std::sync::{Arc, RwLock};

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};

use super::public;
use crate::api::public::ApiError;
use crate::api::state::AppState;
use crate::markdown::clean_for_speech;
use crate::speech::speak;

type SharedState = Arc<RwLock<AppState>>;

/// Read a reply out loud. Responds with a WAV file.
async fn speech_handler(
    State(state): State<SharedState>,
    axum::Json(payload): axum::Json<public::SpeechRequest>,
) -> Result<Response, ApiError> {
    if clean_for_speech(&payload.text).is_empty() {
        return Ok((StatusCode::BAD_REQUEST, "Nothing to read out loud").into_response());
    }

    let (api_hostname, api_key, tts_model, tts_voice) = {
        let shared_state = state.read().expect("Unable to read share state");
        let config = &shared_state.config;
        (
            config.gemini_api_hostname.clone(),
            config.gemini_api_key.clone(),
            config.tts_model.clone(),
            config.tts_voice.clone(),
        )
    };
    let wav = speak(&payload.text, &api_hostname, &api_key, &tts_model, &tts_voice).await?;

    Ok(([(header::CONTENT_TYPE, "audio/wav")], wav).into_response())
}

/// Create the speech router
pub fn router() -> Router<SharedState> {
    Router::new().route("/", post(speech_handler))
}
