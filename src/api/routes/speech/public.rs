//! Public types for the speech API
use serde::Deserialize;

#[derive(Deserialize)]
pub struct SpeechRequest {
    pub text: String,
}
