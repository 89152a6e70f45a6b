use std::time::Duration;

use anyhow::{Error, Result, anyhow, bail};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use futures::stream::BoxStream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "model")]
    Model,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

// Requests and responses use the same part shapes. Parts we don't
// know about (e.g. `functionCall`) fall through to `Other` so one odd
// part doesn't fail the whole response. `Thought` must come before
// `Text` since untagged variants are tried in order and a thought
// summary also carries a `text` field.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(untagged)]
pub enum Part {
    Thought {
        text: String,
        thought: bool,
    },
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: Blob,
    },
    Other(Value),
}

impl Part {
    pub fn text(text: &str) -> Self {
        Part::Text {
            text: text.to_string(),
        }
    }

    pub fn inline_data(mime_type: &str, data: &str) -> Self {
        Part::InlineData {
            inline_data: Blob {
                mime_type: mime_type.to_string(),
                data: data.to_string(),
            },
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self {
            role: Some(role),
            parts,
        }
    }

    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                Part::Thought {
                    text,
                    thought: false,
                } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    fn first_content(&self) -> Option<&Content> {
        self.candidates.first().and_then(|c| c.content.as_ref())
    }
}

fn endpoint(api_hostname: &str, model: &str, method: &str) -> String {
    format!(
        "{}/v1beta/models/{}:{}",
        api_hostname.trim_end_matches("/"),
        model,
        method
    )
}

fn payload(contents: &[Content], system_instruction: Option<&str>) -> Value {
    let mut payload = json!({ "contents": contents });
    if let Some(instruction) = system_instruction {
        payload["systemInstruction"] = json!({ "parts": [{ "text": instruction }] });
    }
    payload
}

/// Generate a complete response in one request.
pub async fn generate(
    contents: &[Content],
    system_instruction: Option<&str>,
    api_hostname: &str,
    api_key: &str,
    model: &str,
) -> Result<String, Error> {
    let url = endpoint(api_hostname, model, "generateContent");
    let response: GenerateContentResponse = reqwest::Client::new()
        .post(url)
        .header("x-goog-api-key", api_key)
        .header("Content-Type", "application/json")
        .timeout(Duration::from_secs(60 * 5))
        .json(&payload(contents, system_instruction))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let content = response
        .first_content()
        .ok_or(anyhow!("Response has no candidates"))?;

    Ok(content.text())
}

/// Stream the response text as it is generated.
///
/// The returned stream is lazy, finite, and can't be restarted. Each
/// item is the text of one server sent event. Transport failures
/// (connection, auth, quota) are yielded as an `Err` after which the
/// stream ends.
pub fn generate_stream(
    contents: Vec<Content>,
    system_instruction: Option<String>,
    api_hostname: &str,
    api_key: &str,
    model: &str,
) -> BoxStream<'static, Result<String>> {
    let url = format!(
        "{}?alt=sse",
        endpoint(api_hostname, model, "streamGenerateContent")
    );
    let api_key = api_key.to_string();

    Box::pin(async_stream::try_stream! {
        let response = reqwest::Client::new()
            .post(url)
            .header("x-goog-api-key", api_key)
            .header("Content-Type", "application/json")
            .timeout(Duration::from_secs(60 * 5))
            .json(&payload(&contents, system_instruction.as_deref()))
            .send()
            .await?
            .error_for_status()?;

        let mut stream = response.bytes_stream();

        // Bytes rather than a `String` so that a multi-byte character
        // split across two network chunks is decoded only once the
        // whole event has arrived.
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;

            // Append new data to buffer. This is necessary to handle SSE
            // fragmentation over HTTP/2 frames. Carriage returns are
            // dropped so events are always separated by "\n\n".
            buffer.extend(chunk.iter().filter(|b| **b != b'\r'));

            // Process all complete SSE events from the buffer
            while let Some(event_end) = find_event_end(&buffer) {
                let event_bytes: Vec<u8> = buffer.drain(..event_end + 2).collect();
                let event_data = std::str::from_utf8(&event_bytes)?.trim();

                if let Some(text) = parse_event(event_data)? {
                    yield text;
                }
            }
        }

        // The last event may not be followed by a blank line
        let remaining = std::str::from_utf8(&buffer)?.trim();
        if let Some(text) = parse_event(remaining)? {
            yield text;
        }
    })
}

fn find_event_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

/// Extract the text from one SSE event. Returns `None` for events
/// that carry no text such as keep-alives or the final usage event.
fn parse_event(event_data: &str) -> Result<Option<String>> {
    // Skip empty events and anything that isn't data
    let Some(data) = event_data.strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim();
    if data.is_empty() {
        return Ok(None);
    }

    let chunk = serde_json::from_str::<GenerateContentResponse>(data).inspect_err(|e| {
        tracing::error!("Parsing stream chunk failed for {}\nError:{}", data, e)
    })?;

    let text = chunk.first_content().map(Content::text).unwrap_or_default();
    if text.is_empty() {
        return Ok(None);
    }
    Ok(Some(text))
}

/// Synthesize speech for `text` and return the raw audio bytes
/// (16-bit little endian PCM, mono, 24kHz).
pub async fn synthesize_speech(
    text: &str,
    api_hostname: &str,
    api_key: &str,
    model: &str,
    voice: &str,
) -> Result<Vec<u8>, Error> {
    let payload = json!({
        "contents": [{ "parts": [{ "text": text }] }],
        "generationConfig": {
            "responseModalities": ["AUDIO"],
            "speechConfig": {
                "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": voice } }
            }
        }
    });
    let url = endpoint(api_hostname, model, "generateContent");
    let response: GenerateContentResponse = reqwest::Client::new()
        .post(url)
        .header("x-goog-api-key", api_key)
        .header("Content-Type", "application/json")
        .timeout(Duration::from_secs(60 * 2))
        .json(&payload)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let audio = response
        .first_content()
        .and_then(|c| {
            c.parts.iter().find_map(|p| match p {
                Part::InlineData { inline_data } => Some(inline_data.data.as_str()),
                _ => None,
            })
        });
    let Some(audio) = audio else {
        bail!("No audio data in speech response");
    };

    Ok(STANDARD.decode(audio)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), r#""user""#);
        assert_eq!(serde_json::to_string(&Role::Model).unwrap(), r#""model""#);
    }

    #[test]
    fn test_content_serialization() {
        let content = Content::new(
            Role::User,
            vec![Part::inline_data("application/pdf", "AAAA"), Part::text("Résume")],
        );
        assert_eq!(
            serde_json::to_string(&content).unwrap(),
            r#"{"role":"user","parts":[{"inlineData":{"mimeType":"application/pdf","data":"AAAA"}},{"text":"Résume"}]}"#
        );
    }

    #[test]
    fn test_payload_with_system_instruction() {
        let contents = vec![Content::new(Role::User, vec![Part::text("Salut")])];
        let value = payload(&contents, Some("Tu es ADA."));
        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "Tu es ADA.");
        assert_eq!(value["contents"][0]["parts"][0]["text"], "Salut");

        let value = payload(&contents, None);
        assert!(value.get("systemInstruction").is_none());
    }

    #[test]
    fn test_unknown_parts_are_tolerated() {
        let json = r#"{"candidates":[{"content":{"role":"model","parts":[{"thought":true},{"text":"Bonjour"}]},"finishReason":"STOP"}]}"#;
        let resp: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.first_content().unwrap().text(), "Bonjour");
    }

    #[test]
    fn test_thought_summaries_are_not_reply_text() {
        let json = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Je réfléchis au contrat.","thought":true},{"text":"Bonjour"}]}}]}"#;
        let resp: GenerateContentResponse = serde_json::from_str(json).unwrap();
        let content = resp.first_content().unwrap();
        assert!(matches!(content.parts[0], Part::Thought { thought: true, .. }));
        assert_eq!(content.text(), "Bonjour");

        let event = r#"data: {"candidates":[{"content":{"parts":[{"text":"Hmm","thought":true}]}}]}"#;
        assert_eq!(parse_event(event).unwrap(), None);

        let json = r#"{"role":"model","parts":[{"text":"Oui","thought":false}]}"#;
        let content: Content = serde_json::from_str(json).unwrap();
        assert_eq!(content.text(), "Oui");
    }

    #[test]
    fn test_parse_event() {
        let event = r#"data: {"candidates":[{"content":{"role":"model","parts":[{"text":"Bon"}]}}]}"#;
        assert_eq!(parse_event(event).unwrap(), Some("Bon".to_string()));
        assert_eq!(parse_event("").unwrap(), None);
        assert_eq!(parse_event(": keep-alive").unwrap(), None);
        assert_eq!(
            parse_event(r#"data: {"candidates":[],"usageMetadata":{}}"#).unwrap(),
            None
        );
        assert!(parse_event("data: {not json").is_err());
    }

    #[test]
    fn test_find_event_end() {
        assert_eq!(find_event_end(b"data: x\n\ndata: y"), Some(7));
        assert_eq!(find_event_end(b"data: x\n"), None);
    }

    #[tokio::test]
    async fn test_generate_basic() {
        let mut server = mockito::Server::new_async().await;

        let response_body = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Le différend est un désaccord."}]},
                "finishReason": "STOP"
            }]
        }"#;

        let mock = server
            .mock("POST", "/v1beta/models/gemini-test:generateContent")
            .match_header("x-goog-api-key", "test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(response_body)
            .create();

        let contents = vec![Content::new(Role::User, vec![Part::text("Différend ?")])];
        let result = generate(&contents, None, &server.url(), "test-key", "gemini-test").await;

        mock.assert();
        assert_eq!(result.unwrap(), "Le différend est un désaccord.");
    }

    #[tokio::test]
    async fn test_generate_error_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/models/gemini-test:generateContent")
            .with_status(429)
            .with_body(r#"{"error":{"code":429,"message":"quota"}}"#)
            .create();

        let contents = vec![Content::new(Role::User, vec![Part::text("Q")])];
        let result = generate(&contents, None, &server.url(), "test-key", "gemini-test").await;

        mock.assert();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_generate_stream_content() {
        let mut server = mockito::Server::new_async().await;

        let sse_response = "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"Bonjour, \"}]}}]}\r\n\r\ndata: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"voici ma réponse.\"}]},\"finishReason\":\"STOP\"}]}\r\n\r\n";

        let mock = server
            .mock("POST", "/v1beta/models/gemini-test:streamGenerateContent")
            .match_query(mockito::Matcher::UrlEncoded("alt".into(), "sse".into()))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(sse_response)
            .create();

        let contents = vec![Content::new(Role::User, vec![Part::text("Salut")])];
        let chunks = generate_stream(
            contents,
            Some("Tu es ADA.".to_string()),
            &server.url(),
            "test-key",
            "gemini-test",
        )
        .collect::<Vec<_>>()
        .await;

        mock.assert();
        let chunks = chunks.into_iter().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(chunks, vec!["Bonjour, ", "voici ma réponse."]);
    }

    #[tokio::test]
    async fn test_generate_stream_transport_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/models/gemini-test:streamGenerateContent")
            .match_query(mockito::Matcher::Any)
            .with_status(403)
            .create();

        let contents = vec![Content::new(Role::User, vec![Part::text("Salut")])];
        let mut chunks = generate_stream(contents, None, &server.url(), "bad-key", "gemini-test");

        let first = chunks.next().await.expect("Expected an item");
        mock.assert();
        assert!(first.is_err());
        assert!(chunks.next().await.is_none());
    }

    #[tokio::test]
    async fn test_synthesize_speech() {
        let mut server = mockito::Server::new_async().await;

        let audio = STANDARD.encode([1u8, 2, 3, 4]);
        let response_body = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{"inlineData": {"mimeType": "audio/L16;codec=pcm;rate=24000", "data": audio}}]
                }
            }]
        })
        .to_string();

        let mock = server
            .mock("POST", "/v1beta/models/tts-test:generateContent")
            .match_body(mockito::Matcher::PartialJson(json!({
                "generationConfig": {"responseModalities": ["AUDIO"]}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(response_body)
            .create();

        let result =
            synthesize_speech("Bonjour", &server.url(), "test-key", "tts-test", "Kore").await;

        mock.assert();
        assert_eq!(result.unwrap(), vec![1u8, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_synthesize_speech_without_audio() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1beta/models/tts-test:generateContent")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"no audio"}]}}]}"#)
            .create();

        let result =
            synthesize_speech("Bonjour", &server.url(), "test-key", "tts-test", "Kore").await;
        assert!(result.is_err());
    }
}
