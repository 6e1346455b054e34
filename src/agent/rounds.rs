use crate::errors::PartbotError;
use crate::providers::base::{ChatRequest, LLMProvider, Message, ResponseAction};
use crate::tools::{ToolCallRecord, ToolRegistry};
use serde_json::json;
use tracing::{debug, warn};

/// Hard cap on generate/call rounds within one attempt.
pub const MAX_ROUNDS: usize = 3;

/// Answer substituted when the backend produces nothing usable.
pub const FALLBACK_ANSWER: &str =
    "I apologize, but I couldn't generate a proper response based on the available \
     information. Please try rephrasing your question.";

/// Result of one pass through the round loop: the raw answer text, the
/// ordered lookups that produced it, and the conversation as extended by
/// the tool exchanges.
pub struct RoundsOutcome {
    pub answer: String,
    pub records: Vec<ToolCallRecord>,
    pub conversation: Vec<Message>,
}

fn provider_error(e: anyhow::Error) -> PartbotError {
    match e.downcast::<PartbotError>() {
        Ok(pe) => pe,
        Err(e) => PartbotError::Provider {
            message: e.to_string(),
            retryable: true,
        },
    }
}

/// Run the generate/call loop for one attempt.
///
/// Each round asks the backend for either free text (done) or tool calls,
/// which are executed strictly in the order emitted and appended to the
/// conversation as a call/result message pair. Tool misuse (unknown name,
/// missing required argument) ends the attempt with the fallback answer;
/// a lookup or generation transport failure is fatal for the attempt and
/// propagates to the retry controller.
pub async fn run_rounds(
    provider: &dyn LLMProvider,
    registry: &ToolRegistry,
    mut conversation: Vec<Message>,
    model: Option<&str>,
    temperature: f32,
    max_tokens: u32,
) -> Result<RoundsOutcome, PartbotError> {
    let tool_defs = registry.definitions();
    let mut records: Vec<ToolCallRecord> = Vec::new();
    let mut last_text: Option<String> = None;

    for round in 0..MAX_ROUNDS {
        let response = provider
            .chat(ChatRequest {
                messages: conversation.clone(),
                tools: Some(tool_defs.clone()),
                model,
                max_tokens,
                temperature,
                response_format: None,
            })
            .await
            .map_err(provider_error)?;

        match response.into_action() {
            ResponseAction::Text(text) => {
                debug!("round {} produced final text ({} chars)", round, text.len());
                return Ok(RoundsOutcome {
                    answer: text,
                    records,
                    conversation,
                });
            }
            ResponseAction::Empty => {
                warn!("round {} produced no usable content", round);
                return Ok(RoundsOutcome {
                    answer: FALLBACK_ANSWER.to_string(),
                    records,
                    conversation,
                });
            }
            ResponseAction::ToolCalls { calls, text } => {
                conversation.push(Message::assistant(
                    text.clone().unwrap_or_default(),
                    Some(calls.clone()),
                ));

                for call in &calls {
                    match registry.dispatch(call).await {
                        Ok(result) => {
                            debug!(
                                "tool '{}' returned {}",
                                call.name,
                                match &result {
                                    serde_json::Value::Array(items) =>
                                        format!("{} items", items.len()),
                                    serde_json::Value::Null => "no result".to_string(),
                                    _ => "1 item".to_string(),
                                }
                            );
                            let payload = serde_json::to_string(&result)
                                .unwrap_or_else(|_| "null".to_string());
                            conversation.push(Message::tool_result(&call.name, payload));
                            records.push(ToolCallRecord {
                                function: call.name.clone(),
                                args: call.arguments.clone(),
                                result,
                            });
                        }
                        Err(
                            e @ (PartbotError::UnknownTool(_)
                            | PartbotError::InvalidArguments { .. }),
                        ) => {
                            warn!("tool misuse ends the round loop: {}", e);
                            let marker = json!({ "error": e.to_string() });
                            conversation
                                .push(Message::tool_result(&call.name, marker.to_string()));
                            records.push(ToolCallRecord {
                                function: call.name.clone(),
                                args: call.arguments.clone(),
                                result: marker,
                            });
                            return Ok(RoundsOutcome {
                                answer: FALLBACK_ANSWER.to_string(),
                                records,
                                conversation,
                            });
                        }
                        Err(e) => return Err(e),
                    }
                }
                last_text = text;
            }
        }
    }

    // Cap reached: use whatever text the last generation produced, if any.
    warn!("round cap ({}) reached without final text", MAX_ROUNDS);
    let answer = last_text
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_ANSWER.to_string());
    Ok(RoundsOutcome {
        answer,
        records,
        conversation,
    })
}
