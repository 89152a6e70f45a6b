use anyhow::Result;

use crate::core::AppConfig;
use crate::speech::speak;

pub async fn run(config: &AppConfig, text: &str, out: &str) -> Result<()> {
    let wav = speak(
        text,
        &config.gemini_api_hostname,
        &config.gemini_api_key,
        &config.tts_model,
        &config.tts_voice,
    )
    .await?;
    tokio::fs::write(out, &wav).await?;
    println!("Wrote {} bytes of audio to {}", wav.len(), out);
    Ok(())
}
