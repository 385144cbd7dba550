//! GenAI-based model service
//!
//! Uses the genai framework to reach OpenAI, Anthropic, Gemini, Ollama and
//! other providers. The transcript is converted to a genai `ChatRequest` on
//! every call; tool execution stays with the session driver.
//!
//! Set `LLM_LOG_FILE` to log every request/response pair (see `logging`).

use async_trait::async_trait;
use futures::StreamExt;
use genai::chat::{ChatMessage, ChatOptions, ChatRequest, ChatStreamEvent, Tool, ToolCall, ToolResponse};
use genai::resolver::{AuthData, AuthResolver};
use genai::{Client, WebConfig};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

use super::logging::{LogConfig, log_llm_interaction};
use super::{ModelService, ModelTurn, TokenUsage};
use crate::error::{Error, Result};
use crate::message::{ContentBlock, Message, Role, ToolResult, ToolUse};
use crate::tools::ToolSpecification;

/// Providers reachable through genai
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    OpenAI,
    Anthropic,
    Gemini,
    Groq,
    DeepSeek,
    XAI,
    Ollama,
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(ProviderType::OpenAI),
            "anthropic" => Ok(ProviderType::Anthropic),
            "gemini" | "google" => Ok(ProviderType::Gemini),
            "groq" => Ok(ProviderType::Groq),
            "deepseek" => Ok(ProviderType::DeepSeek),
            "xai" | "grok" => Ok(ProviderType::XAI),
            "ollama" => Ok(ProviderType::Ollama),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

impl ProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::OpenAI => "openai",
            ProviderType::Anthropic => "anthropic",
            ProviderType::Gemini => "gemini",
            ProviderType::Groq => "groq",
            ProviderType::DeepSeek => "deepseek",
            ProviderType::XAI => "xai",
            ProviderType::Ollama => "ollama",
        }
    }

    /// Model used when none is configured
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderType::OpenAI => "gpt-4o",
            ProviderType::Anthropic => "claude-sonnet-4-5-20250929",
            ProviderType::Gemini => "gemini-2.5-flash",
            ProviderType::Groq => "llama-3.3-70b-versatile",
            ProviderType::DeepSeek => "deepseek-chat",
            ProviderType::XAI => "grok-3",
            ProviderType::Ollama => "llama3.2",
        }
    }

    /// Environment variable holding the API key
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            ProviderType::OpenAI => Some("OPENAI_API_KEY"),
            ProviderType::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderType::Gemini => Some("GEMINI_API_KEY"),
            ProviderType::Groq => Some("GROQ_API_KEY"),
            ProviderType::DeepSeek => Some("DEEPSEEK_API_KEY"),
            ProviderType::XAI => Some("XAI_API_KEY"),
            ProviderType::Ollama => None,
        }
    }
}

pub struct GenAIProvider {
    client: Client,
    provider_type: ProviderType,
    model: String,
}

impl GenAIProvider {
    /// Default timeout for LLM API requests (5 minutes)
    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

    fn default_web_config() -> WebConfig {
        WebConfig::default()
            .with_timeout(Self::DEFAULT_TIMEOUT)
            .with_connect_timeout(Duration::from_secs(30))
    }

    /// Create a provider that resolves credentials from the environment
    pub fn new(provider_type: ProviderType, model: Option<&str>) -> Self {
        let client = Client::builder()
            .with_web_config(Self::default_web_config())
            .build();
        Self {
            client,
            provider_type,
            model: model.unwrap_or(provider_type.default_model()).to_string(),
        }
    }

    /// Create a provider with a specific API key
    pub fn with_api_key(provider_type: ProviderType, api_key: &str, model: Option<&str>) -> Self {
        let api_key = api_key.to_string();
        let auth_resolver = AuthResolver::from_resolver_fn(
            move |_model_iden| -> std::result::Result<Option<AuthData>, genai::resolver::Error> {
                Ok(Some(AuthData::from_single(api_key.clone())))
            },
        );

        let client = Client::builder()
            .with_web_config(Self::default_web_config())
            .with_auth_resolver(auth_resolver)
            .build();

        Self {
            client,
            provider_type,
            model: model.unwrap_or(provider_type.default_model()).to_string(),
        }
    }

    pub fn provider_type(&self) -> ProviderType {
        self.provider_type
    }

    fn build_request(
        &self,
        transcript: &[Message],
        tools: &[ToolSpecification],
        system_prompt: &str,
    ) -> ChatRequest {
        let mut chat_req = ChatRequest::default();
        if !system_prompt.is_empty() {
            chat_req = chat_req.with_system(system_prompt);
        }

        for message in transcript {
            chat_req = match message.role {
                Role::User => convert_user_message(message, chat_req),
                Role::Assistant => convert_assistant_message(message, chat_req),
            };
        }

        if !tools.is_empty() {
            let genai_tools: Vec<Tool> = tools
                .iter()
                .map(|spec| {
                    Tool::new(&spec.name)
                        .with_description(&spec.description)
                        .with_schema(spec.json_schema())
                })
                .collect();
            chat_req = chat_req.with_tools(genai_tools);
        }

        chat_req
    }

    async fn stream_turn(&self, chat_req: ChatRequest) -> Result<ModelTurn> {
        let options = ChatOptions::default().with_capture_usage(true);
        let stream_response = self
            .client
            .exec_chat_stream(&self.model, chat_req, Some(&options))
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, model = %self.model, "LLM request failed");
                Error::Model(format!("GenAI error: {:?}", e))
            })?;

        let mut text = String::new();
        let mut tool_uses = Vec::new();
        let mut usage = TokenUsage::default();
        let mut stream = stream_response.stream;

        while let Some(event) = stream.next().await {
            match event {
                Ok(ChatStreamEvent::Chunk(chunk)) => text.push_str(&chunk.content),
                Ok(ChatStreamEvent::ToolCallChunk(tc)) => {
                    // Each ToolCallChunk contains a complete ToolCall
                    tool_uses.push(tool_call_to_use(tc.tool_call)?);
                }
                Ok(ChatStreamEvent::End(end)) => {
                    if let Some(captured) = end.captured_usage {
                        let input = captured.prompt_tokens.unwrap_or(0).max(0) as u64;
                        let output = captured.completion_tokens.unwrap_or(0).max(0) as u64;
                        usage = TokenUsage {
                            input_tokens: input,
                            output_tokens: output,
                            total_tokens: captured
                                .total_tokens
                                .map(|t| t.max(0) as u64)
                                .unwrap_or(input + output),
                        };
                    }
                    break;
                }
                Ok(_) => {
                    // Start, reasoning and thought-signature events carry no turn content
                }
                Err(e) => {
                    tracing::error!(error = ?e, model = %self.model, "LLM stream error");
                    return Err(Error::Model(format!("GenAI stream error: {:?}", e)));
                }
            }
        }

        let stop_reason = if tool_uses.is_empty() { "end_turn" } else { "tool_use" };
        let mut content = Vec::with_capacity(tool_uses.len() + 1);
        if !text.is_empty() {
            content.push(ContentBlock::Text(text));
        }
        content.extend(tool_uses.into_iter().map(ContentBlock::ToolUse));

        Ok(ModelTurn::new(Message::assistant(content))
            .with_usage(usage)
            .with_stop_reason(stop_reason))
    }
}

fn tool_call_to_use(call: ToolCall) -> Result<ToolUse> {
    let arguments = match call.fn_arguments {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        // Some providers hand back the arguments as a JSON string
        Value::String(raw) if raw.trim().is_empty() => Map::new(),
        Value::String(raw) => match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => map,
            _ => {
                return Err(Error::Model(format!(
                    "Tool call '{}' has non-object arguments",
                    call.fn_name
                )));
            }
        },
        _ => {
            return Err(Error::Model(format!(
                "Tool call '{}' has non-object arguments",
                call.fn_name
            )));
        }
    };

    Ok(ToolUse {
        id: call.call_id,
        name: call.fn_name,
        arguments,
    })
}

/// Text blocks become user messages; tool results become tool responses
fn convert_user_message(message: &Message, chat_req: ChatRequest) -> ChatRequest {
    let mut req = chat_req;
    for block in &message.content {
        match block {
            ContentBlock::Text(text) => {
                req = req.append_message(ChatMessage::user(text.as_str()));
            }
            ContentBlock::ToolResult(result) => {
                let tool_response = ToolResponse::new(result.tool_use_id.clone(), tool_response_content(result));
                req = req.append_message(tool_response);
            }
            ContentBlock::ToolUse(_) => {
                // Tool use blocks in user messages are unusual, skip
            }
        }
    }
    req
}

/// genai tool responses carry no status, so failures are marked in the text
fn tool_response_content(result: &ToolResult) -> String {
    if result.is_error() {
        format!("Error: {}", result.joined_text())
    } else {
        result.joined_text()
    }
}

/// Assistant turns with tool calls are sent as a single tool-call message
/// (OpenAI/DeepSeek reject split ones); plain turns as assistant text.
fn convert_assistant_message(message: &Message, chat_req: ChatRequest) -> ChatRequest {
    let tool_calls: Vec<ToolCall> = message
        .tool_uses()
        .map(|tool_use| ToolCall {
            call_id: tool_use.id.clone(),
            fn_name: tool_use.name.clone(),
            fn_arguments: Value::Object(tool_use.arguments.clone()),
            thought_signatures: None,
        })
        .collect();

    if !tool_calls.is_empty() {
        return chat_req.append_message(tool_calls);
    }

    let text = message.joined_text();
    if text.is_empty() {
        chat_req
    } else {
        chat_req.append_message(ChatMessage::assistant(text))
    }
}

#[async_trait]
impl ModelService for GenAIProvider {
    fn name(&self) -> &str {
        self.provider_type.as_str()
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate_turn(
        &self,
        transcript: &[Message],
        tools: &[ToolSpecification],
        system_prompt: &str,
    ) -> Result<ModelTurn> {
        let chat_req = self.build_request(transcript, tools, system_prompt);
        debug!(model = %self.model, messages = transcript.len(), tools = tools.len(), "GenAI request");

        let result = self.stream_turn(chat_req).await;

        let error_text = result.as_ref().err().map(|e| e.to_string());
        log_llm_interaction(LogConfig {
            model: &self.model,
            provider: Some(self.provider_type.as_str()),
            system_prompt: Some(system_prompt),
            messages: transcript,
            tools: Some(tools),
            result: result.as_ref().ok(),
            error: error_text.as_deref(),
        });

        result
    }
}
