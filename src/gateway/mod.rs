//! Model gateway.
//!
//! This module abstracts the remote text-generation endpoint. Every
//! prompt in the pipeline goes through [`ModelGateway::invoke`], which
//! returns the raw reply text along with the model that served it.

pub mod http;
#[cfg(test)]
pub mod testing;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use http::HttpGateway;

/// Statuses that advance to the next fallback model.
pub const RETRYABLE_STATUSES: &[u16] = &[404, 429, 502, 503];

/// Errors raised by a gateway call.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no API key supplied")]
    MissingApiKey,

    #[error("upstream error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("undecodable upstream response: {0}")]
    Decode(String),

    #[error("no candidate models configured")]
    NoCandidates,
}

impl GatewayError {
    /// HTTP-style status of the failure, 0 when none applies.
    pub fn status(&self) -> u16 {
        match self {
            GatewayError::MissingApiKey => 401,
            GatewayError::Status { status, .. } => *status,
            _ => 0,
        }
    }

    /// Whether the next fallback model should be tried.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Status { status, .. } => RETRYABLE_STATUSES.contains(status),
            GatewayError::Transport(_) => true,
            _ => false,
        }
    }
}

/// A single prompt sent to the gateway.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub text: String,
    /// Model to try first.
    pub model: Option<String>,
    /// Whether other models may serve the prompt when the first one fails.
    pub fallback: bool,
    pub max_tokens: u32,
}

impl Prompt {
    pub fn new(text: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            text: text.into(),
            model: None,
            fallback: true,
            max_tokens,
        }
    }

    pub fn with_model(mut self, model: Option<&str>) -> Self {
        self.model = model.map(String::from);
        self
    }

    /// Pin the prompt to its model.
    pub fn pinned(mut self) -> Self {
        self.fallback = false;
        self
    }
}

/// Raw reply text and the model that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub model: String,
}

/// Key and model status, shaped like the endpoint's health reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub has_api_key: bool,
    pub engine: String,
    pub models: Vec<String>,
}

/// Remote text generation, with model fallback.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn invoke(&self, api_key: &str, prompt: &Prompt) -> Result<Completion, GatewayError>;
}

/// Ordered, de-duplicated list of models to try for a prompt.
pub fn candidate_models(prompt: &Prompt, fallback_order: &[String]) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::new();

    if let Some(ref hint) = prompt.model {
        candidates.push(hint.clone());
        if !prompt.fallback {
            return candidates;
        }
    }

    for model in fallback_order {
        if !candidates.contains(model) {
            candidates.push(model.clone());
        }
    }

    if !prompt.fallback {
        candidates.truncate(1);
    }

    candidates
}
