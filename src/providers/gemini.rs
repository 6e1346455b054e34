use crate::providers::base::{
    ChatRequest, LLMProvider, LLMResponse, ResponseFormat, ToolCallRequest,
};
use crate::providers::errors::ProviderErrorHandler;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;

const CONNECT_TIMEOUT_SECS: u64 = 30;
const REQUEST_TIMEOUT_SECS: u64 = 120;
const TOP_P: f32 = 0.95;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiProvider {
    api_key: String,
    default_model: String,
    base_url: String,
    client: Client,
}

impl GeminiProvider {
    pub fn new(api_key: String, default_model: Option<String>) -> Self {
        Self::with_base_url(api_key, default_model, BASE_URL.to_string())
    }

    pub fn with_base_url(api_key: String, default_model: Option<String>, base_url: String) -> Self {
        Self {
            api_key,
            default_model: default_model.unwrap_or_else(|| "gemini-2.5-flash".to_string()),
            base_url,
            client: Client::builder()
                .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    fn parse_response(json: &Value) -> Result<LLMResponse> {
        let candidate = json["candidates"]
            .as_array()
            .and_then(|arr| arr.first())
            .context("No candidates in Gemini response")?;

        let content = candidate["content"]["parts"].as_array().and_then(|parts| {
            parts.iter().find_map(|p| {
                if p["text"].is_string() {
                    p["text"].as_str().map(std::string::ToString::to_string)
                } else {
                    None
                }
            })
        });

        let mut tool_calls = Vec::new();
        if let Some(parts) = candidate["content"]["parts"].as_array() {
            for part in parts {
                if let Some(fc) = part.get("functionCall")
                    && fc.is_object()
                {
                    tool_calls.push(ToolCallRequest {
                        id: fc["id"].as_str().unwrap_or("").to_string(),
                        name: fc["name"].as_str().unwrap_or("").to_string(),
                        arguments: fc["args"].clone(),
                    });
                }
            }
        }

        let total_tokens = json
            .get("usageMetadata")
            .and_then(|u| u.get("totalTokenCount"))
            .and_then(serde_json::Value::as_u64);

        Ok(LLMResponse {
            content,
            tool_calls,
            total_tokens,
        })
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    async fn chat(&self, req: ChatRequest<'_>) -> Result<LLMResponse> {
        let gemini_contents: Vec<Value> = req
            .messages
            .into_iter()
            .map(|msg| {
                let role = match msg.role.as_str() {
                    "assistant" => "model",
                    "tool" => "function",
                    // Gemini has no system role; everything else maps to "user"
                    _ => "user",
                };

                let mut parts = Vec::new();
                if msg.role == "tool" {
                    // Tool results travel back as functionResponse parts
                    let name = msg.tool_name.unwrap_or_default();
                    let response: Value = serde_json::from_str(&msg.content)
                        .unwrap_or_else(|_| json!({ "result": msg.content }));
                    parts.push(json!({
                        "functionResponse": {
                            "name": name,
                            "response": { "result": response }
                        }
                    }));
                } else {
                    if !msg.content.is_empty() {
                        parts.push(json!({ "text": msg.content }));
                    }
                    if let Some(tool_calls) = msg.tool_calls {
                        for tc in tool_calls {
                            parts.push(json!({
                                "functionCall": {
                                    "name": tc.name,
                                    "args": tc.arguments
                                }
                            }));
                        }
                    }
                    if parts.is_empty() {
                        parts.push(json!({ "text": "" }));
                    }
                }

                json!({
                    "role": role,
                    "parts": parts
                })
            })
            .collect();

        let mut generation_config = json!({
            "maxOutputTokens": req.max_tokens,
            "temperature": req.temperature,
            "topP": TOP_P,
        });
        if let Some(ResponseFormat::JsonObject) = req.response_format {
            generation_config["responseMimeType"] = json!("application/json");
        }

        let mut payload = json!({
            "contents": gemini_contents,
            "generationConfig": generation_config,
        });

        if let Some(tools) = req.tools {
            payload["tools"] = json!([{
                "functionDeclarations": tools
                    .into_iter()
                    .map(|t| json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters
                    }))
                    .collect::<Vec<_>>()
            }]);
        }

        let model_name = req.model.unwrap_or(&self.default_model);
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model_name, self.api_key
        );

        let resp = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .context("Failed to send request to Gemini API")?;

        let json = ProviderErrorHandler::check_response(resp, "Gemini").await?;

        Self::parse_response(&json)
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}
