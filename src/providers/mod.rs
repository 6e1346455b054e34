pub mod base;
pub mod errors;
pub mod gemini;

pub use base::{
    ChatRequest, LLMProvider, LLMResponse, Message, ResponseAction, ResponseFormat,
    ToolCallRequest, ToolDefinition,
};
pub use gemini::GeminiProvider;
