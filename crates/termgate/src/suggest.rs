//! Suggestion proxy: forwards prompts to the Gemini generateContent API.
//!
//! This component only returns text for a human to review. It never
//! executes anything; acting on a suggestion takes a separate, explicit
//! `/exec` call.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GeminiConfig;

/// Fixed system instruction sent with every prompt.
const SYSTEM_PROMPT: &str = "You are an assistant that suggests PowerShell/CLI commands \
to run in a controlled environment. Respond with JSON containing a \"suggestions\" field: \
an array of objects { \"command\": \"...\", \"explanation\": \"...\" }. Only commands \
approved manually by the operator will ever be executed.";

/// Upstream request timeout. A hung upstream must not hang the caller.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Ceiling for the raw-body fallback returned when the response carries
/// no extractable candidate text.
const RAW_FALLBACK_BYTES: usize = 2000;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// Client for the upstream text-generation endpoint.
#[derive(Debug, Clone)]
pub struct SuggestClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl SuggestClient {
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url,
            urlencoding::encode(&self.model)
        )
    }

    /// Forward a prompt and return the first candidate's text.
    ///
    /// Falls back to a bounded raw dump of the response body when no
    /// candidate text is present, so the caller always receives
    /// something printable.
    pub async fn suggest(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            system_instruction: Content {
                parts: vec![Part {
                    text: SYSTEM_PROMPT,
                }],
            },
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                max_output_tokens: 512,
            },
        };

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .context("sending request to the Gemini API")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("reading Gemini API response body")?;

        if !status.is_success() {
            bail!(
                "Gemini API error ({status}): {}",
                truncate_utf8(&body, RAW_FALLBACK_BYTES)
            );
        }

        debug!(bytes = body.len(), "gemini response received");

        let text = serde_json::from_str::<GenerateResponse>(&body)
            .ok()
            .and_then(|r| extract_text(&r));

        Ok(match text {
            Some(text) => text,
            None => truncate_utf8(&body, RAW_FALLBACK_BYTES).to_string(),
        })
    }
}

fn extract_text(response: &GenerateResponse) -> Option<String> {
    response
        .candidates
        .first()?
        .content
        .as_ref()?
        .parts
        .first()?
        .text
        .clone()
        .filter(|t| !t.is_empty())
}

/// Truncate to at most `max` bytes without splitting a UTF-8 character.
fn truncate_utf8(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
