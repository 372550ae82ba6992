//! Advice adapter for the Gemini `generateContent` API.
//!
//! The call is blocking and bounded by the agent timeout. The API key is read
//! once from a secret file and kept in a zeroizing buffer; it is sent as a
//! header so it never appears in a logged URL.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::json;
use zeroize::Zeroizing;

use crate::config::AdviceConfig;
use crate::ports::{AdviceError, AdviceGenerator, AdviceRequest};

const SYSTEM_INSTRUCTION: &str = "You are a supportive health assistant, not a doctor. \
Give short, empathetic, practical lifestyle suggestions in plain language. \
Do not diagnose, do not prescribe medication, and recommend seeing a \
healthcare professional for medical decisions.";

const MAX_OUTPUT_TOKENS: u32 = 400;

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

/// Gemini-backed [`AdviceGenerator`].
pub struct GeminiAdvice {
    agent: ureq::Agent,
    url: String,
    api_key: Zeroizing<String>,
}

impl GeminiAdvice {
    /// Build the client from configuration.
    ///
    /// # Errors
    /// Returns `NotConfigured` when no API key file is configured or it is empty.
    pub fn from_config(config: &AdviceConfig) -> Result<Self, AdviceError> {
        let key_file = config
            .api_key_file
            .as_deref()
            .ok_or_else(|| AdviceError::NotConfigured("no API key file".into()))?;
        let api_key = read_api_key(key_file)?;

        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        let url = format!(
            "{}/models/{}:generateContent",
            config.endpoint.trim_end_matches('/'),
            config.model
        );
        tracing::info!("Advice backend enabled (model {})", config.model);

        Ok(Self { agent, url, api_key })
    }
}

fn read_api_key(path: &Path) -> Result<Zeroizing<String>, AdviceError> {
    let content = Zeroizing::new(
        fs::read_to_string(path)
            .map_err(|e| AdviceError::NotConfigured(format!("failed reading API key file: {e}")))?,
    );
    let key = content.trim();
    if key.is_empty() {
        return Err(AdviceError::NotConfigured("API key file is empty".into()));
    }
    Ok(Zeroizing::new(key.to_string()))
}

fn extract_text(response: GenerateResponse) -> Result<String, AdviceError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    let text = text.trim();
    if text.is_empty() {
        return Err(AdviceError::Empty);
    }
    Ok(text.to_string())
}

impl AdviceGenerator for GeminiAdvice {
    fn advise(&self, request: &AdviceRequest<'_>) -> Result<String, AdviceError> {
        let body = json!({
            "system_instruction": { "parts": [{ "text": SYSTEM_INSTRUCTION }] },
            "contents": [{ "role": "user", "parts": [{ "text": request.prompt() }] }],
            "generationConfig": { "maxOutputTokens": MAX_OUTPUT_TOKENS, "temperature": 0.4 },
        });

        let response = self
            .agent
            .post(&self.url)
            .set("x-goog-api-key", self.api_key.as_str())
            .set("Content-Type", "application/json")
            .send_json(&body);

        match response {
            Ok(resp) => {
                let parsed: GenerateResponse = resp
                    .into_json()
                    .map_err(|e| AdviceError::Decode(e.to_string()))?;
                extract_text(parsed)
            }
            Err(ureq::Error::Status(code, resp)) => {
                let detail = resp.into_string().unwrap_or_default();
                tracing::debug!("Advice backend error body: {detail}");
                Err(AdviceError::Status { status: code })
            }
            Err(e) => Err(AdviceError::Transport(e.to_string())),
        }
    }
}
