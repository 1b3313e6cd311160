//! Summarization collaborators.
//!
//! Defines the [`Summarizer`] trait and concrete implementations:
//! - **[`NullSummarizer`]**: produces nothing; used when disabled.
//! - **[`LeadSummarizer`]**: keeps the first sentences of the text.
//! - **[`OpenAISummarizer`]**: calls the OpenAI chat completions API with
//!   retry and backoff.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, ... (capped at 2^5)

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::SummarizeConfig;

/// Condenses extracted text.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Provider identifier, e.g. `"openai"`.
    fn name(&self) -> &str;

    /// Returns a summary of `text`, or `None` when the provider produces
    /// nothing for it.
    async fn summarize(&self, text: &str) -> Result<Option<String>>;
}

/// Summarizer that never produces a summary.
pub struct NullSummarizer;

#[async_trait]
impl Summarizer for NullSummarizer {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn summarize(&self, _text: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

// ============ Lead Summarizer ============

/// Takes the first `max_sentences` sentences, with whitespace collapsed.
pub struct LeadSummarizer {
    max_sentences: usize,
}

impl LeadSummarizer {
    pub fn new(max_sentences: usize) -> Self {
        Self { max_sentences }
    }
}

#[async_trait]
impl Summarizer for LeadSummarizer {
    fn name(&self) -> &str {
        "lead"
    }

    async fn summarize(&self, text: &str) -> Result<Option<String>> {
        Ok(lead_sentences(text, self.max_sentences))
    }
}

fn lead_sentences(text: &str, max_sentences: usize) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }

    let mut end = collapsed.len();
    let mut seen = 0;
    let mut chars = collapsed.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let boundary = matches!(c, '.' | '!' | '?')
            && chars.peek().map(|(_, n)| *n == ' ').unwrap_or(true);
        if boundary {
            seen += 1;
            if seen == max_sentences {
                end = i + c.len_utf8();
                break;
            }
        }
    }
    Some(collapsed[..end].to_string())
}

// ============ OpenAI Summarizer ============

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Summarizer using the OpenAI chat completions API.
///
/// Requires the `OPENAI_API_KEY` environment variable to be set.
pub struct OpenAISummarizer {
    model: String,
    max_sentences: usize,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAISummarizer {
    /// # Errors
    ///
    /// Returns an error if `model` is not set in config or if
    /// `OPENAI_API_KEY` is not in the environment.
    pub fn new(config: &SummarizeConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("summarize.model required for OpenAI provider"))?;

        if std::env::var("OPENAI_API_KEY").is_err() {
            bail!("OPENAI_API_KEY environment variable not set");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            max_sentences: config.max_sentences,
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl Summarizer for OpenAISummarizer {
    fn name(&self) -> &str {
        "openai"
    }

    async fn summarize(&self, text: &str) -> Result<Option<String>> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": format!(
                        "Summarize the OCR text of a scanned document in at most {} sentences.",
                        self.max_sentences
                    ),
                },
                { "role": "user", "content": text },
            ],
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(OPENAI_CHAT_URL)
                .header("Authorization", format!("Bearer {}", api_key))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_chat_response(&json);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(anyhow::anyhow!(
                            "OpenAI API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    bail!("OpenAI API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Summarization failed after retries")))
    }
}

/// Pulls `choices[0].message.content` out of a chat completion.
fn parse_chat_response(json: &serde_json::Value) -> Result<Option<String>> {
    let content = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing message content"))?;

    let trimmed = content.trim();
    Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}

/// Builds the summarizer selected by `[summarize].provider`.
pub fn create_summarizer(config: &SummarizeConfig) -> Result<Box<dyn Summarizer>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(NullSummarizer)),
        "lead" => Ok(Box::new(LeadSummarizer::new(config.max_sentences))),
        "openai" => Ok(Box::new(OpenAISummarizer::new(config)?)),
        other => bail!("Unknown summarize provider: {}", other),
    }
}
