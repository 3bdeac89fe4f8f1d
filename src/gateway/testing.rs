//! Scripted gateway for tests.

use super::{Completion, GatewayError, ModelGateway, Prompt};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Model id reported when a prompt carries no model.
pub const DEFAULT_MODEL: &str = "scripted-model";

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail(u16),
}

#[derive(Debug, Clone)]
struct Rule {
    model: Option<String>,
    contains: Option<String>,
    reply: Reply,
}

/// Gateway answering from a list of rules; the first matching rule wins.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    rules: Vec<Rule>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `text` to prompts containing `needle`.
    pub fn reply_when(mut self, needle: &str, text: &str) -> Self {
        self.rules.push(Rule {
            model: None,
            contains: Some(needle.to_string()),
            reply: Reply::Text(text.to_string()),
        });
        self
    }

    /// Fail prompts containing `needle` with `status`.
    pub fn fail_when(mut self, needle: &str, status: u16) -> Self {
        self.rules.push(Rule {
            model: None,
            contains: Some(needle.to_string()),
            reply: Reply::Fail(status),
        });
        self
    }

    /// Reply with `text` to prompts addressed to `model`.
    pub fn reply_for_model(mut self, model: &str, text: &str) -> Self {
        self.rules.push(Rule {
            model: Some(model.to_string()),
            contains: None,
            reply: Reply::Text(text.to_string()),
        });
        self
    }

    /// Fail prompts addressed to `model`.
    pub fn fail_for_model(mut self, model: &str, status: u16) -> Self {
        self.rules.push(Rule {
            model: Some(model.to_string()),
            contains: None,
            reply: Reply::Fail(status),
        });
        self
    }

    /// Reply with `text` to anything no earlier rule matched.
    pub fn reply_otherwise(mut self, text: &str) -> Self {
        self.rules.push(Rule {
            model: None,
            contains: None,
            reply: Reply::Text(text.to_string()),
        });
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    async fn invoke(&self, api_key: &str, prompt: &Prompt) -> Result<Completion, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.clone());
        tokio::task::yield_now().await;

        if api_key.is_empty() {
            return Err(GatewayError::MissingApiKey);
        }

        let rule = self.rules.iter().find(|rule| {
            let model_ok = match rule.model {
                Some(ref m) => prompt.model.as_deref() == Some(m.as_str()),
                None => true,
            };
            let text_ok = match rule.contains {
                Some(ref needle) => prompt.text.contains(needle.as_str()),
                None => true,
            };
            model_ok && text_ok
        });

        match rule.map(|r| &r.reply) {
            Some(Reply::Text(text)) => Ok(Completion {
                text: text.clone(),
                model: prompt
                    .model
                    .clone()
                    .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            }),
            Some(Reply::Fail(status)) => Err(GatewayError::Status {
                status: *status,
                body: "scripted failure".to_string(),
            }),
            None => Err(GatewayError::Status {
                status: 503,
                body: "no scripted reply".to_string(),
            }),
        }
    }
}
