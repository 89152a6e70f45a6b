//! Reading replies out loud.
use anyhow::{Result, bail};

use crate::gemini;
use crate::markdown::clean_for_speech;

/// Output format of the speech model.
pub const SAMPLE_RATE: u32 = 24_000;
pub const CHANNELS: u16 = 1;
pub const BITS_PER_SAMPLE: u16 = 16;

/// Synthesize `text` and return a playable WAV file. Markdown markup
/// is removed first so it isn't read out.
pub async fn speak(
    text: &str,
    api_hostname: &str,
    api_key: &str,
    model: &str,
    voice: &str,
) -> Result<Vec<u8>> {
    let cleaned = clean_for_speech(text);
    if cleaned.is_empty() {
        bail!("Nothing to read out loud");
    }
    tracing::debug!("Synthesizing {} characters of speech", cleaned.chars().count());

    let pcm = gemini::synthesize_speech(&cleaned, api_hostname, api_key, model, voice).await?;
    Ok(pcm_to_wav(&pcm, SAMPLE_RATE, CHANNELS, BITS_PER_SAMPLE))
}

/// Wrap raw little endian PCM samples in a canonical 44 byte WAV header.
pub fn pcm_to_wav(pcm: &[u8], sample_rate: u32, channels: u16, bits_per_sample: u16) -> Vec<u8> {
    let block_align = channels * bits_per_sample / 8;
    let byte_rate = sample_rate * block_align as u32;
    let data_len = pcm.len() as u32;

    let mut wav = Vec::with_capacity(44 + pcm.len());
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    // PCM
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&channels.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&bits_per_sample.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.extend_from_slice(pcm);
    wav
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde_json::json;

    #[test]
    fn test_pcm_to_wav_header() {
        let wav = pcm_to_wav(&[0, 1, 2, 3], SAMPLE_RATE, CHANNELS, BITS_PER_SAMPLE);
        assert_eq!(wav.len(), 48);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(wav[4..8].try_into().unwrap()), 40);
        assert_eq!(&wav[8..16], b"WAVEfmt ");
        assert_eq!(u32::from_le_bytes(wav[24..28].try_into().unwrap()), 24_000);
        // Byte rate for 16-bit mono
        assert_eq!(u32::from_le_bytes(wav[28..32].try_into().unwrap()), 48_000);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u32::from_le_bytes(wav[40..44].try_into().unwrap()), 4);
        assert_eq!(&wav[44..], &[0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_speak_sends_cleaned_text() {
        let mut server = mockito::Server::new_async().await;
        let response_body = json!({
            "candidates": [{"content": {"parts": [
                {"inlineData": {"mimeType": "audio/L16;codec=pcm;rate=24000", "data": STANDARD.encode([9u8, 9])}}
            ]}}]
        })
        .to_string();
        let mock = server
            .mock("POST", "/v1beta/models/tts-test:generateContent")
            .match_body(mockito::Matcher::PartialJson(json!({
                "contents": [{"parts": [{"text": "La CIJ et sa compétence"}]}],
                "generationConfig": {
                    "speechConfig": {"voiceConfig": {"prebuiltVoiceConfig": {"voiceName": "Kore"}}}
                }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(response_body)
            .create();

        let wav = speak(
            "- **La CIJ** et sa compétence",
            &server.url(),
            "test-key",
            "tts-test",
            "Kore",
        )
        .await
        .unwrap();

        mock.assert();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[44..], &[9, 9]);
    }

    #[tokio::test]
    async fn test_speak_nothing_to_say() {
        let result = speak("### **", "http://127.0.0.1:1", "k", "m", "v").await;
        assert!(result.is_err());
    }
}
