use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool invocation requested by the generation backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Raw response from a generation backend call.
#[derive(Debug, Clone)]
pub struct LLMResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
    /// Total token count reported by the provider (if available).
    pub total_tokens: Option<u64>,
}

/// Closed view of a backend response. The round loop branches on this
/// instead of probing `content`/`tool_calls` in multiple nested ways.
#[derive(Debug, Clone)]
pub enum ResponseAction {
    /// Final free text, no tool requested.
    Text(String),
    /// An ordered batch of tool calls, with any text the model emitted
    /// alongside them.
    ToolCalls {
        calls: Vec<ToolCallRequest>,
        text: Option<String>,
    },
    /// No usable content at all.
    Empty,
}

impl LLMResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Collapse the response into its closed action variant. Tool calls take
    /// precedence; whitespace-only text counts as empty.
    pub fn into_action(self) -> ResponseAction {
        if !self.tool_calls.is_empty() {
            return ResponseAction::ToolCalls {
                calls: self.tool_calls,
                text: self.content.filter(|c| !c.trim().is_empty()),
            };
        }
        match self.content {
            Some(text) if !text.trim().is_empty() => ResponseAction::Text(text),
            _ => ResponseAction::Empty,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Message {
    pub role: String,
    pub content: String,
    pub tool_calls: Option<Vec<ToolCallRequest>>,
    /// Set on role="tool" messages carrying a tool result.
    pub tool_name: Option<String>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Option<Vec<ToolCallRequest>>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
            tool_calls,
            ..Default::default()
        }
    }

    pub fn tool_result(tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".into(),
            content: content.into(),
            tool_name: Some(tool_name.into()),
            ..Default::default()
        }
    }
}

/// Declaration of one callable operation, as exposed to the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value, // JSON Schema
}

/// Response format constraint for backend output.
#[derive(Debug, Clone)]
pub enum ResponseFormat {
    /// Request JSON output (Gemini: `responseMimeType: "application/json"`).
    JsonObject,
}

/// Parameters for one chat request to a generation backend.
#[derive(Debug, Clone)]
pub struct ChatRequest<'a> {
    pub messages: Vec<Message>,
    pub tools: Option<Vec<ToolDefinition>>,
    pub model: Option<&'a str>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Optional response format constraint (used by the grading call).
    pub response_format: Option<ResponseFormat>,
}

/// A remote text-generation backend that supports declared tools.
///
/// No retry-with-backoff lives behind this trait: each call is a single
/// bounded request, and regeneration happens only at the attempt level.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn chat(&self, req: ChatRequest<'_>) -> anyhow::Result<LLMResponse>;

    fn default_model(&self) -> &str;
}
