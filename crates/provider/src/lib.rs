//! Language model boundary
//!
//! An ordered list of role-tagged messages goes in, text comes out.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use thiserror::Error;
use tracing::{debug, trace};

pub mod openai;

pub use openai::OpenAiProvider;

/// Reply prefix meaning no provider was reachable or configured
pub const STUB_SENTINEL: &str = "[stub]";
/// Reply prefix meaning the provider call failed
pub const ERROR_SENTINEL: &str = "[error]";

/// Whether a reply signals provider unavailability
pub fn is_unavailable(reply: &str) -> bool {
    reply.starts_with(STUB_SENTINEL) || reply.starts_with(ERROR_SENTINEL)
}

/// Provider errors
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("malformed response body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("provider rejected request: {0}")]
    Api(String),

    #[error("no API key configured")]
    NoApiKey,

    #[error("response has no choices")]
    InvalidResponse,

    #[error("rate limited")]
    RateLimited,
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Model reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: Option<String>,
    #[serde(default)]
    pub finish_reason: String,
}

impl ChatResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            finish_reason: "stop".to_string(),
        }
    }
}

/// One conversation entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// Request parameters
#[derive(Debug, Clone)]
pub struct ChatParams {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for ChatParams {
    fn default() -> Self {
        Self {
            model: String::new(),
            messages: Vec::new(),
            max_tokens: 4096,
            temperature: 0.2,
        }
    }
}

/// A chat-completion backend
#[async_trait]
pub trait Provider: Send + Sync {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse>;
    fn default_model(&self) -> String;
    fn is_configured(&self) -> bool;
}

/// Ask the provider for a reply, folding every failure into the sentinel
/// text convention so callers see a single string either way.
pub async fn complete<P: Provider + ?Sized>(provider: &P, params: ChatParams) -> String {
    if !provider.is_configured() {
        debug!("provider not configured, returning stub reply");
        return format!("{} llm unavailable", STUB_SENTINEL);
    }

    trace!("requesting completion with {} messages", params.messages.len());
    match provider.chat(params).await {
        Ok(response) => response
            .content
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "(no content returned)".to_string()),
        Err(e) => {
            debug!("provider call failed: {}", e);
            format!("{} {}", ERROR_SENTINEL, e)
        }
    }
}
