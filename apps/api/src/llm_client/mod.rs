//! LLM Client: the single point of entry for all model calls in the placeholder API.
//!
//! ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
//! All model interactions go through the `StructuredModel` trait implemented here.
//!
//! Structured output is obtained by forcing a single tool call whose input schema is
//! the expected output shape. The client returns the tool input untouched; callers
//! own validation via `parse_structured`.
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::placeholders::models::{ConversationTurn, Role};

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all LLM calls.
/// This is intentionally hardcoded to prevent accidental drift.
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 4096;
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned no structured output")]
    EmptyContent,

    /// The structured payload did not satisfy the declared output contract.
    #[error("Schema validation failed: {reason}")]
    SchemaValidation { reason: String, raw: String },
}

/// Output contract handed to the model as a forced tool.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

/// A single schema-constrained model call.
#[derive(Debug, Clone, Copy)]
pub struct StructuredRequest<'a> {
    pub system: &'a str,
    pub tool: &'a ToolSpec,
    pub messages: &'a [ConversationTurn],
}

/// The model-invocation seam. Production uses `LlmClient`; tests script responses.
#[async_trait]
pub trait StructuredModel: Send + Sync {
    /// Returns the raw structured payload produced for `request.tool`.
    async fn complete(
        &self,
        api_key: &str,
        request: StructuredRequest<'_>,
    ) -> Result<Value, LlmError>;
}

/// Deserializes a structured payload, keeping the raw JSON on failure for diagnostics.
pub fn parse_structured<T: DeserializeOwned>(raw: &Value) -> Result<T, LlmError> {
    serde_json::from_value(raw.clone()).map_err(|e| LlmError::SchemaValidation {
        reason: e.to_string(),
        raw: raw.to_string(),
    })
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
    tools: Vec<AnthropicTool<'a>>,
    tool_choice: ToolChoice<'a>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct AnthropicTool<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a Value,
}

#[derive(Debug, Serialize)]
struct ToolChoice<'a> {
    #[serde(rename = "type")]
    choice_type: &'a str,
    name: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub name: Option<String>,
    pub input: Option<Value>,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the input of the first `tool_use` block for the named tool.
    pub fn tool_input(&self, tool_name: &str) -> Option<&Value> {
        self.content
            .iter()
            .find(|b| b.block_type == "tool_use" && b.name.as_deref() == Some(tool_name))
            .and_then(|b| b.input.as_ref())
    }

    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// The single LLM client used by all services.
/// Wraps the Anthropic Messages API with transport retry and forced-tool structured output.
/// The API key is supplied per call since callers may bring their own credential.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
}

impl LlmClient {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// Makes a raw call to the Claude API, returning the full response object.
    /// Retries on 429 (rate limit) and 5xx errors with exponential backoff.
    pub async fn call(
        &self,
        api_key: &str,
        request: StructuredRequest<'_>,
    ) -> Result<LlmResponse, LlmError> {
        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            temperature: 0.0,
            system: request.system,
            messages: provider_messages(request.messages),
            tools: vec![AnthropicTool {
                name: request.tool.name,
                description: request.tool.description,
                input_schema: &request.tool.input_schema,
            }],
            tool_choice: ToolChoice {
                choice_type: "tool",
                name: request.tool.name,
            },
        };

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(ANTHROPIC_API_URL)
                .header("x-api-key", api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(retryable_failure(status.as_u16(), body));
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<AnthropicError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let llm_response: LlmResponse = response.json().await?;

            debug!(
                "LLM call succeeded: tool={}, input_tokens={}, output_tokens={}",
                request.tool.name, llm_response.usage.input_tokens, llm_response.usage.output_tokens
            );

            return Ok(llm_response);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

/// The error reported for a retryable status if no later attempt succeeds.
fn retryable_failure(status: u16, body: String) -> LlmError {
    if status == 429 {
        LlmError::RateLimited {
            retries: MAX_RETRIES,
        }
    } else {
        LlmError::Api {
            status,
            message: body,
        }
    }
}

impl Default for LlmClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StructuredModel for LlmClient {
    async fn complete(
        &self,
        api_key: &str,
        request: StructuredRequest<'_>,
    ) -> Result<Value, LlmError> {
        let response = self.call(api_key, request).await?;
        match response.tool_input(request.tool.name) {
            Some(input) => Ok(input.clone()),
            None => match response.text() {
                Some(text) => Err(LlmError::SchemaValidation {
                    reason: format!("model did not call the `{}` tool", request.tool.name),
                    raw: text.to_string(),
                }),
                None => Err(LlmError::EmptyContent),
            },
        }
    }
}

/// Maps conversation turns onto the provider's message list.
/// The provider requires the first message to come from the user, so leading
/// assistant turns (possible after windowing) are dropped.
fn provider_messages(turns: &[ConversationTurn]) -> Vec<AnthropicMessage<'_>> {
    turns
        .iter()
        .skip_while(|t| t.role == Role::Assistant)
        .map(|t| AnthropicMessage {
            role: t.role.as_str(),
            content: &t.content,
        })
        .collect()
}
