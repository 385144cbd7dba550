//! Bedrock Converse model service
//!
//! Talks to `POST /model/{modelId}/converse` with a bearer API key. The
//! transcript already serializes in the Converse message shape, so requests
//! carry it verbatim.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::logging::{LogConfig, log_llm_interaction};
use super::{ModelService, ModelTurn, TokenUsage};
use crate::error::{Error, Result};
use crate::message::{ContentBlock, Message, Role};
use crate::tools::ToolSpecification;

/// Sampling parameters sent as `inferenceConfig`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceConfig {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1000,
            temperature: 0.0,
            top_p: 1.0,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConverseRequest<'a> {
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    system: Vec<SystemBlock<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_config: Option<ToolConfig>,
    inference_config: InferenceConfig,
}

#[derive(Debug, Serialize)]
struct SystemBlock<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct ToolConfig {
    tools: Vec<ToolEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolEntry {
    tool_spec: ToolSpecEntry,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolSpecEntry {
    name: String,
    description: String,
    input_schema: JsonSchema,
}

#[derive(Debug, Serialize)]
struct JsonSchema {
    json: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConverseResponse {
    output: ConverseOutput,
    stop_reason: Option<String>,
    usage: Option<ConverseUsage>,
}

#[derive(Debug, Deserialize)]
struct ConverseOutput {
    message: Option<RawMessage>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    role: Role,
    #[serde(default)]
    content: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConverseUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
    total_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "Message")]
    message: Option<String>,
}

pub struct BedrockProvider {
    client: Client,
    base_url: String,
    model_id: String,
    api_key: String,
    inference: InferenceConfig,
}

impl BedrockProvider {
    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

    pub fn new(model_id: impl Into<String>, region: &str, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Self::DEFAULT_TIMEOUT)
                .connect_timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: Self::regional_endpoint(region),
            model_id: model_id.into(),
            api_key: api_key.into(),
            inference: InferenceConfig::default(),
        }
    }

    pub fn regional_endpoint(region: &str) -> String {
        format!("https://bedrock-runtime.{}.amazonaws.com", region)
    }

    /// Override the runtime endpoint (VPC endpoints, local proxies, tests)
    pub fn with_endpoint(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_inference(mut self, inference: InferenceConfig) -> Self {
        self.inference = inference;
        self
    }

    fn converse_url(&self) -> String {
        format!("{}/model/{}/converse", self.base_url, encode_model_id(&self.model_id))
    }

    fn build_request<'a>(
        &self,
        transcript: &'a [Message],
        tools: &[ToolSpecification],
        system_prompt: &'a str,
    ) -> ConverseRequest<'a> {
        let system = if system_prompt.is_empty() {
            Vec::new()
        } else {
            vec![SystemBlock { text: system_prompt }]
        };

        let tool_config = (!tools.is_empty()).then(|| ToolConfig {
            tools: tools
                .iter()
                .map(|spec| ToolEntry {
                    tool_spec: ToolSpecEntry {
                        name: spec.name.clone(),
                        description: spec.description.clone(),
                        input_schema: JsonSchema {
                            json: spec.json_schema(),
                        },
                    },
                })
                .collect(),
        });

        ConverseRequest {
            messages: transcript,
            system,
            tool_config,
            inference_config: self.inference,
        }
    }

    async fn send(&self, request: &ConverseRequest<'_>) -> Result<ModelTurn> {
        let response = self
            .client
            .post(self.converse_url())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Model(format!("Bedrock request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Model(format!("Failed to read Bedrock response: {}", e)))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or(body);
            return Err(Error::Model(format!("Bedrock returned {}: {}", status, detail)));
        }

        parse_response(&body)
    }
}

/// Percent-encode characters Bedrock model ids and ARNs use that are not
/// valid in a single path segment
fn encode_model_id(model_id: &str) -> String {
    let mut encoded = String::with_capacity(model_id.len());
    for c in model_id.chars() {
        match c {
            ':' => encoded.push_str("%3A"),
            '/' => encoded.push_str("%2F"),
            _ => encoded.push(c),
        }
    }
    encoded
}

fn parse_response(body: &str) -> Result<ModelTurn> {
    let response: ConverseResponse = serde_json::from_str(body)
        .map_err(|e| Error::Model(format!("Malformed Converse response: {}", e)))?;

    let raw = response
        .output
        .message
        .ok_or_else(|| Error::Model("Converse response has no output message".to_string()))?;

    let mut content = Vec::with_capacity(raw.content.len());
    for block in raw.content {
        let is_tool_use = block.get("toolUse").is_some();
        match serde_json::from_value::<ContentBlock>(block) {
            Ok(parsed) => content.push(parsed),
            Err(e) if is_tool_use => {
                return Err(Error::Model(format!("Malformed toolUse block: {}", e)));
            }
            Err(e) => {
                // Reasoning, images and other block kinds are not part of a session
                warn!("Skipping unsupported content block: {}", e);
            }
        }
    }

    let usage = response
        .usage
        .map(|u| TokenUsage {
            input_tokens: u.input_tokens,
            output_tokens: u.output_tokens,
            total_tokens: u.total_tokens.unwrap_or(u.input_tokens + u.output_tokens),
        })
        .unwrap_or_default();

    let mut turn = ModelTurn::new(Message::new(raw.role, content)).with_usage(usage);
    turn.stop_reason = response.stop_reason;
    Ok(turn)
}

#[async_trait]
impl ModelService for BedrockProvider {
    fn name(&self) -> &str {
        "bedrock"
    }

    fn model(&self) -> &str {
        &self.model_id
    }

    async fn generate_turn(
        &self,
        transcript: &[Message],
        tools: &[ToolSpecification],
        system_prompt: &str,
    ) -> Result<ModelTurn> {
        let request = self.build_request(transcript, tools, system_prompt);
        debug!(model = %self.model_id, messages = transcript.len(), tools = tools.len(), "Converse request");

        let result = self.send(&request).await;

        let error_text = result.as_ref().err().map(|e| e.to_string());
        log_llm_interaction(LogConfig {
            model: &self.model_id,
            provider: Some("bedrock"),
            system_prompt: Some(system_prompt),
            messages: transcript,
            tools: Some(tools),
            result: result.as_ref().ok(),
            error: error_text.as_deref(),
        });

        if let Some(e) = &error_text {
            error!(model = %self.model_id, error = %e, "Bedrock request failed");
        }
        result
    }
}
