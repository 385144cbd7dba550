//! Model services
//!
//! A [`ModelService`] produces the next assistant turn for a transcript.
//! Implementations:
//! - [`BedrockProvider`]: the Converse API over HTTPS
//! - [`GenAIProvider`]: OpenAI, Anthropic, Gemini, Ollama and friends
//!   through the genai framework

pub mod bedrock;
pub mod factory;
mod genai_provider;
mod logging;

pub use bedrock::{BedrockProvider, InferenceConfig};
pub use factory::create_model_service;
pub use genai_provider::{GenAIProvider, ProviderType};
pub use logging::{LogConfig, log_llm_interaction};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::Message;
use crate::tools::ToolSpecification;

/// Token accounting for one generation call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }

    pub fn add(&mut self, other: &TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// One generated assistant turn plus its accounting
#[derive(Debug, Clone, PartialEq)]
pub struct ModelTurn {
    pub message: Message,
    pub usage: TokenUsage,
    /// Provider-reported reason the turn ended (`end_turn`, `tool_use`, ...)
    pub stop_reason: Option<String>,
}

impl ModelTurn {
    pub fn new(message: Message) -> Self {
        Self {
            message,
            usage: TokenUsage::default(),
            stop_reason: None,
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_stop_reason(mut self, reason: impl Into<String>) -> Self {
        self.stop_reason = Some(reason.into());
        self
    }
}

/// A language-model service that can take part in a tool-calling session
#[async_trait]
pub trait ModelService: Send + Sync {
    /// Provider name (e.g., "bedrock", "openai")
    fn name(&self) -> &str;

    /// Model identifier requests are sent to
    fn model(&self) -> &str;

    /// Generate the next assistant turn.
    ///
    /// `tools` is passed unchanged on every call of a session; an empty
    /// `system_prompt` means no system prompt is sent.
    async fn generate_turn(
        &self,
        transcript: &[Message],
        tools: &[ToolSpecification],
        system_prompt: &str,
    ) -> Result<ModelTurn>;
}

#[async_trait]
impl<M: ModelService + ?Sized> ModelService for std::sync::Arc<M> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn model(&self) -> &str {
        (**self).model()
    }

    async fn generate_turn(
        &self,
        transcript: &[Message],
        tools: &[ToolSpecification],
        system_prompt: &str,
    ) -> Result<ModelTurn> {
        (**self).generate_turn(transcript, tools, system_prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_accumulates() {
        let mut total = TokenUsage::default();
        total.add(&TokenUsage::new(100, 20));
        total.add(&TokenUsage {
            input_tokens: 5,
            output_tokens: 5,
            total_tokens: 12,
        });
        assert_eq!(total.input_tokens, 105);
        assert_eq!(total.output_tokens, 25);
        assert_eq!(total.total_tokens, 132);
    }
}
