//! Text generation backends.
//!
//! [`Generator`] is the seam between BüroBuddy and whatever completes its
//! prompts: an OpenAI-compatible HTTP endpoint (feature `openai`), AWS
//! Bedrock (feature `bedrock`) or the offline [`StubGenerator`].

use async_trait::async_trait;
use burobuddy_core::Role;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::prompt::ANALYSIS_SYSTEM_PROMPT;

#[derive(Error, Debug)]
pub enum GenerateError {
    #[cfg(feature = "openai")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[cfg(feature = "bedrock")]
    #[error("Bedrock request failed: {0}")]
    Bedrock(String),
    #[error("backend returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("backend returned no completion")]
    EmptyResponse,
    #[error("message is empty")]
    EmptyPrompt,
    #[error("message is {len} characters, the limit is {max}")]
    PromptTooLong { len: usize, max: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

impl From<Role> for PromptRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => Self::User,
            Role::Assistant => Self::Assistant,
        }
    }
}

/// One message of a chat-style prompt. Serialises to the OpenAI wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::Assistant,
            content: content.into(),
        }
    }
}

/// Sampling settings for one kind of request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerationParams {
    pub const ANALYSIS: Self = Self {
        max_tokens: 4096,
        temperature: 0.2,
    };

    pub const CHAT: Self = Self {
        max_tokens: 1024,
        temperature: 0.3,
    };
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub messages: Vec<PromptMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerateRequest {
    pub fn new(messages: Vec<PromptMessage>, params: GenerationParams) -> Self {
        Self {
            messages,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerateResponse {
    /// Raw completion text, untrimmed.
    pub text: String,
    /// Model that actually served the request.
    pub model: String,
    pub tokens_used: u32,
}

#[async_trait]
pub trait Generator: Send + Sync {
    /// Model name reported for stored analyses.
    fn model(&self) -> &str;

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, GenerateError>;
}

#[async_trait]
impl<G: Generator + ?Sized> Generator for Box<G> {
    fn model(&self) -> &str {
        (**self).model()
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, GenerateError> {
        (**self).generate(request).await
    }
}

// ── Offline backend ──

pub const STUB_MODEL: &str = "stub";

pub const STUB_CHAT_REPLY: &str = "Chat is disabled. Set OPENAI_API_KEY to enable document Q&A.";

/// Backend used when no API key is configured.
///
/// Analysis requests get a fixed low-risk sample analysis; anything else gets
/// [`STUB_CHAT_REPLY`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StubGenerator;

impl StubGenerator {
    fn sample_analysis() -> String {
        json!({
            "language_detected": "de",
            "summary_en": "Sample summary (set OPENAI_API_KEY for real analysis).",
            "overall_risk": "low",
            "actions": [],
            "deadlines": [],
            "entities": {
                "sender": null,
                "amount_eur": null,
                "iban": null,
                "reference_number": null,
                "contact_phone": null,
                "address": null
            }
        })
        .to_string()
    }
}

#[async_trait]
impl Generator for StubGenerator {
    fn model(&self) -> &str {
        STUB_MODEL
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, GenerateError> {
        let is_analysis = request
            .messages
            .first()
            .is_some_and(|m| m.role == PromptRole::System && m.content == ANALYSIS_SYSTEM_PROMPT);
        let text = if is_analysis {
            Self::sample_analysis()
        } else {
            STUB_CHAT_REPLY.to_string()
        };
        Ok(GenerateResponse {
            text,
            model: STUB_MODEL.to_string(),
            tokens_used: 0,
        })
    }
}
