//! An [`LLMClient`] backed by an OpenAI-compatible chat-completions endpoint
//! with JSON-schema-constrained output (spec.md §6 "the LLM provider is
//! swappable behind `LLMClient`").
//!
//! Grounded on the teacher's `core/src/alert/ntfy.rs` /
//! `core/src/alert/pushover.rs`: a lazily-built, process-wide
//! `reqwest::Client`, a single `post().json().send()` call, and
//! status-code-driven error reporting.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use clockwork_completion::{CompletionError, CompletionRequest, LLMClient};
use serde::Deserialize;
use serde_json::{json, Value};

/// Configuration for the hosted endpoint: base URL, model name, and the key
/// used to authenticate (spec.md §6 `--api-key`/`--model`).
#[derive(Debug, Clone)]
pub struct HttpLLMConfig {
  pub base_url: String,
  pub api_key: String,
  pub model: String,
  pub request_timeout: Duration,
}

impl HttpLLMConfig {
  pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
    HttpLLMConfig {
      base_url: base_url.into(),
      api_key: api_key.into(),
      model: model.into(),
      request_timeout: Duration::from_secs(60),
    }
  }
}

pub struct HttpLLMClient {
  config: HttpLLMConfig,
}

impl HttpLLMClient {
  pub fn new(config: HttpLLMConfig) -> Self {
    HttpLLMClient { config }
  }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
  message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
  content: String,
}

#[async_trait]
impl LLMClient for HttpLLMClient {
  async fn structured_complete(&self, req: CompletionRequest) -> Result<Value, CompletionError> {
    let mut last_error = String::new();
    let attempts = req.retries.max(1);

    for attempt in 0..attempts {
      let body = json!({
        "model": self.config.model,
        "messages": [
          {"role": "system", "content": format!("{}\n\nRespond with a single JSON object matching this shape: {}", req.system_prompt, req.schema)},
          {"role": "user", "content": req.user_prompt},
        ],
        "tools": req.tools,
        "response_format": {"type": "json_object"},
      });

      let value = match self.call(&body).await {
        Ok(v) => v,
        Err(e) => {
          last_error = e;
          tracing::warn!("completion attempt {attempt} failed: {last_error}");
          continue;
        }
      };

      match (req.validator)(&value) {
        Ok(()) => return Ok(value),
        Err(reason) => {
          last_error = reason;
          tracing::warn!("completion attempt {attempt} failed validation: {last_error}");
        }
      }
    }

    Err(CompletionError::Provider(format!(
      "exhausted {attempts} attempts, last error: {last_error}"
    )))
  }
}

impl HttpLLMClient {
  async fn call(&self, body: &Value) -> Result<Value, String> {
    let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
    let response = http_client()
      .post(&url)
      .bearer_auth(&self.config.api_key)
      .timeout(self.config.request_timeout)
      .json(body)
      .send()
      .await
      .map_err(|e| format!("request failed: {e}"))?;

    let status = response.status();
    if !status.is_success() {
      let text = response.text().await.unwrap_or_default();
      return Err(format!("provider returned {status}: {text}"));
    }

    let parsed: ChatCompletionResponse = response
      .json()
      .await
      .map_err(|e| format!("failed to decode provider response: {e}"))?;

    let content = parsed
      .choices
      .into_iter()
      .next()
      .ok_or_else(|| "provider returned no choices".to_string())?
      .message
      .content;

    serde_json::from_str(&content).map_err(|e| format!("provider content was not valid JSON: {e}"))
  }
}

fn http_client() -> &'static reqwest::Client {
  static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
  CLIENT.get_or_init(reqwest::Client::new)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn config_builds_with_default_timeout() {
    let config = HttpLLMConfig::new("https://api.example.com/v1", "sk-test", "gpt-test");
    assert_eq!(config.request_timeout, Duration::from_secs(60));
    let client = HttpLLMClient::new(config);
    assert_eq!(client.config.model, "gpt-test");
  }
}
