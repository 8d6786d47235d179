//! The `LlmProvider` plug-in contract.
//!
//! Grounded in `btflow/llm/base.py`'s `LLMProvider` ABC (`generate_text`,
//! `generate_stream`, `MessageChunk`). No concrete provider (OpenAI/Anthropic/
//! Gemini) lives here — those are downstream per the Non-goals; this crate only
//! defines the seam they implement.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::tool::ToolSchema;
use crate::value::Value;

#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("request to model '{model}' timed out after {timeout:?}")]
    Timeout { model: String, timeout: Duration },
    #[error("provider error: {0}")]
    Provider(String),
    #[error("streaming is not supported by this provider")]
    StreamingUnsupported,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct LlmMessage {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

/// One chunk of a streamed response; `tool_calls` accumulates as the provider
/// reveals them (mirrors `MessageChunk` in the source material).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct MessageChunk {
    pub text: String,
    pub tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub prompt: Value,
    pub model: String,
    pub system_instruction: Option<String>,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub timeout: Duration,
    pub tools: Vec<ToolSchema>,
    pub tool_choice: Option<Value>,
    pub strict_tools: bool,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<Value>, model: impl Into<String>) -> Self {
        LlmRequest {
            prompt: prompt.into(),
            model: model.into(),
            system_instruction: None,
            temperature: 0.7,
            top_p: 0.95,
            top_k: 40,
            timeout: Duration::from_secs(60),
            tools: Vec::new(),
            tool_choice: None,
            strict_tools: false,
        }
    }
}

/// External language-model backend seam. One of the three plug-in contracts
/// (alongside `Behavior`/`AsyncLeaf` and `Tool`) this crate defines but never
/// implements.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate_text(&self, request: LlmRequest) -> Result<LlmMessage, LlmError>;

    /// Streaming is optional; providers that don't support it keep the default,
    /// which reports `LlmError::StreamingUnsupported` rather than panicking.
    async fn generate_stream(
        &self,
        request: LlmRequest,
    ) -> Result<BoxStream<'static, Result<MessageChunk, LlmError>>, LlmError> {
        let _ = request;
        Err(LlmError::StreamingUnsupported)
    }
}
