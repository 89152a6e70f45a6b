use std::env;

use crate::ai::prompt::system_instruction;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub storage_path: String,
    pub db_path: String,
    pub gemini_api_hostname: String,
    pub gemini_api_key: String,
    pub model: String,
    pub tts_model: String,
    pub tts_voice: String,
    pub system_message: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let storage_path = env::var("ADA_STORAGE_PATH").unwrap_or("./".to_string());
        let db_path = format!("{}/db", storage_path.trim_end_matches('/'));
        let gemini_api_hostname = env::var("ADA_GEMINI_HOST")
            .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string());
        let gemini_api_key =
            env::var("GEMINI_API_KEY").unwrap_or_else(|_| "thiswontworkforgemini".to_string());
        let model = env::var("ADA_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".to_string());
        let tts_model = env::var("ADA_TTS_MODEL")
            .unwrap_or_else(|_| "gemini-2.5-flash-preview-tts".to_string());
        let tts_voice = env::var("ADA_TTS_VOICE").unwrap_or_else(|_| "Kore".to_string());
        let system_message = env::var("ADA_SYSTEM_MESSAGE").unwrap_or_else(|_| {
            system_instruction()
                .inspect_err(|e| tracing::error!("Failed to render system instruction: {}", e))
                .unwrap_or_default()
        });

        Self {
            storage_path,
            db_path,
            gemini_api_hostname,
            gemini_api_key,
            model,
            tts_model,
            tts_voice,
            system_message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_defaults_from_env() {
        unsafe {
            env::set_var("ADA_STORAGE_PATH", "/tmp/ada/");
            env::set_var("ADA_MODEL", "gemini-test");
            env::remove_var("ADA_SYSTEM_MESSAGE");
        }
        let config = AppConfig::default();
        unsafe {
            env::remove_var("ADA_STORAGE_PATH");
            env::remove_var("ADA_MODEL");
        }

        assert_eq!(config.db_path, "/tmp/ada/db");
        assert_eq!(config.model, "gemini-test");
        assert_eq!(config.tts_voice, "Kore");
        assert!(config.system_message.contains("Tu es **ADA**"));
    }
}
