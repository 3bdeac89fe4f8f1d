//! HTTP gateway for OpenAI-compatible chat completion endpoints.

use super::{candidate_models, Completion, GatewayError, Health, ModelGateway, Prompt};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Settings for the HTTP gateway.
#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    /// Chat completions URL.
    pub url: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
    /// Fallback priority order.
    pub fallback_order: Vec<String>,
    pub referer: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Gateway backed by a real HTTP endpoint.
pub struct HttpGateway {
    config: HttpGatewayConfig,
    http_client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(config: HttpGatewayConfig) -> Result<Self, GatewayError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Local status snapshot. Makes no request.
    pub fn health(&self, api_key: Option<&str>) -> Health {
        Health {
            status: "ok",
            has_api_key: api_key.is_some_and(|k| !k.trim().is_empty()),
            engine: format!(
                "Multi-model ({} models) via {}",
                self.config.fallback_order.len(),
                self.config.url
            ),
            models: self.config.fallback_order.clone(),
        }
    }

    /// One attempt against one model.
    async fn send(&self, api_key: &str, model: &str, prompt: &Prompt) -> Result<Completion, GatewayError> {
        let request = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &self.config.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.text,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: prompt.max_tokens,
        };

        let mut builder = self
            .http_client
            .post(&self.config.url)
            .bearer_auth(api_key)
            .json(&request);
        if let Some(ref referer) = self.config.referer {
            builder = builder.header("HTTP-Referer", referer);
        }
        if let Some(ref title) = self.config.title {
            builder = builder.header("X-Title", title);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Transport(format!(
                    "request timed out after {}s",
                    self.config.timeout_seconds
                ))
            } else if e.is_connect() {
                GatewayError::Transport(format!("cannot connect to {}", self.config.url))
            } else {
                GatewayError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: error_message(&body),
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        let text = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(Completion {
            text,
            model: chat.model.unwrap_or_else(|| model.to_string()),
        })
    }
}

#[async_trait]
impl ModelGateway for HttpGateway {
    async fn invoke(&self, api_key: &str, prompt: &Prompt) -> Result<Completion, GatewayError> {
        if api_key.trim().is_empty() {
            return Err(GatewayError::MissingApiKey);
        }

        let candidates = candidate_models(prompt, &self.config.fallback_order);
        let mut last_error = GatewayError::NoCandidates;

        for model in &candidates {
            debug!("Sending prompt ({} chars) to {}", prompt.text.len(), model);

            match self.send(api_key, model, prompt).await {
                Ok(completion) => {
                    if completion.model != *model {
                        info!("Prompt for {} served by {}", model, completion.model);
                    }
                    return Ok(completion);
                }
                Err(e) if e.is_retryable() => {
                    warn!("Model {} unavailable ({}), trying next", model, e);
                    last_error = e;
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error)
    }
}

/// Pull `error.message` out of an upstream error body, else truncate the body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}
