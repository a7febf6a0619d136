use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::SYSTEM_PROMPT;
use crate::config::ApiSettings;
use crate::data::CodeOracle;
use crate::error::OracleError;

const MAX_RETRIES: u32 = 2;
const INITIAL_BACKOFF_SECS: u64 = 2;
const MAX_ERROR_CONTENT_LEN: usize = 200;
const TEMPERATURE: f32 = 0.2;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Oracle backed by an OpenAI-compatible `/chat/completions` endpoint.
pub struct ChatCompletionsOracle {
    name: String,
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl ChatCompletionsOracle {
    /// # Arguments
    /// * `name` - Backend name used in errors and logs
    /// * `settings` - Key, default model and base URL of the provider
    /// * `model` - Model overriding the provider default
    /// * `timeout` - Limit for one HTTP request
    pub fn new(
        name: &str,
        settings: &ApiSettings,
        model: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or_else(|| OracleError::NotConfigured(name.to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Unavailable(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            name: name.to_string(),
            client,
            endpoint: chat_endpoint(&settings.base_url),
            api_key,
            model: model.unwrap_or(&settings.model).to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl CodeOracle for ChatCompletionsOracle {
    async fn generate(&self, prompt: &str) -> Result<String, OracleError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Message {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: TEMPERATURE,
            stream: false,
        };

        let mut retry_count = 0;
        loop {
            debug!("{}: sending {} byte prompt to {}", self.name, prompt.len(), self.model);
            let response = match self
                .client
                .post(&self.endpoint)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&request)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    if (e.is_timeout() || e.is_connect()) && retry_count < MAX_RETRIES {
                        retry_count += 1;
                        backoff(&self.name, retry_count).await;
                        continue;
                    }
                    return Err(OracleError::Unavailable(format!("{}: {}", self.name, e)));
                }
            };

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| OracleError::RequestFailed(format!("{}: {}", self.name, e)))?;

            if status.is_success() {
                return extract_content(&text);
            }

            if (status.as_u16() == 429 || status.is_server_error()) && retry_count < MAX_RETRIES {
                retry_count += 1;
                backoff(&self.name, retry_count).await;
                continue;
            }

            return Err(match status.as_u16() {
                401 | 403 => OracleError::Unavailable(format!("{}: API key rejected", self.name)),
                429 => OracleError::Unavailable(format!("{}: rate limited", self.name)),
                _ => OracleError::RequestFailed(format!(
                    "{} returned {}: {}",
                    self.name,
                    status,
                    truncate(&text, MAX_ERROR_CONTENT_LEN)
                )),
            });
        }
    }
}

async fn backoff(name: &str, retry_count: u32) {
    let secs = INITIAL_BACKOFF_SECS * 2u64.pow(retry_count.saturating_sub(1));
    warn!("{}: request failed, retrying in {}s", name, secs);
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

fn chat_endpoint(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

/// First choice's message text.
fn extract_content(body: &str) -> Result<String, OracleError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| OracleError::RequestFailed(format!("unexpected response body: {}", e)))?;
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_default();
    if content.trim().is_empty() {
        return Err(OracleError::EmptyResponse);
    }
    Ok(content)
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
