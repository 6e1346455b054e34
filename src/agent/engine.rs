use crate::agent::conversation::{assemble, feedback_message};
use crate::agent::dedupe::collapse_repeats;
use crate::agent::rounds::run_rounds;
use crate::agent::verdict::{self, Validator, Verdict};
use crate::providers::base::{LLMProvider, Message};
use crate::tools::{ToolCallRecord, ToolRegistry};
use std::sync::Arc;
use tracing::{debug, info, warn};

const DEFAULT_TEMPERATURE: f32 = 0.1;
const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Answer for questions the scope pre-check rejects outright.
pub const DECLINE_ANSWER: &str =
    "I can only help with dishwasher and refrigerator replacement parts. Please ask me \
     about finding parts, checking compatibility, or repair guidance for those appliances.";

/// Answer carried by the safe default attempt when every real attempt
/// failed or scored zero.
pub const RETRY_EXHAUSTED_ANSWER: &str =
    "I apologize, but I couldn't generate a reliable response after multiple attempts. \
     Please try rephrasing your question or provide more specific details about your \
     appliance.";

/// Per-turn knobs, caller-configurable on every call.
#[derive(Debug, Clone)]
pub struct TurnOptions {
    pub enable_validation: bool,
    pub validation_threshold: u8,
    pub max_retries: u32,
}

impl Default for TurnOptions {
    fn default() -> Self {
        Self {
            enable_validation: true,
            validation_threshold: 60,
            max_retries: 2,
        }
    }
}

/// Everything the caller gets back for one user message. The conversation
/// is handed back for persistence; the engine keeps no state between turns.
#[derive(Debug)]
pub struct ChatTurnResult {
    pub response: String,
    pub tool_calls: Vec<ToolCallRecord>,
    pub conversation: Vec<Message>,
    pub verdict: Option<Verdict>,
    pub attempt_scores: Vec<u8>,
}

struct Candidate {
    answer: String,
    records: Vec<ToolCallRecord>,
    conversation: Vec<Message>,
    verdict: Verdict,
}

/// The retry controller: turns one user message into a validated answer
/// through up to `max_retries + 1` full attempts of
/// assemble → round loop → post-process → grade.
pub struct ChatEngine {
    provider: Arc<dyn LLMProvider>,
    registry: ToolRegistry,
    validator: Validator,
    model: Option<String>,
    temperature: f32,
    max_tokens: u32,
}

impl ChatEngine {
    pub fn new(provider: Arc<dyn LLMProvider>, registry: ToolRegistry) -> Self {
        let validator = Validator::new(provider.clone(), None);
        Self {
            provider,
            registry,
            validator,
            model: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.validator = Validator::new(self.provider.clone(), model.clone());
        self.model = model;
        self
    }

    pub fn with_generation(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Process one user message against the prior conversation and return a
    /// validated answer. Always returns a result with *some* answer; the
    /// worst case is the apology fallback with score 0 and an issue list.
    pub async fn handle_turn(
        &self,
        user_message: &str,
        history: &[Message],
        opts: &TurnOptions,
    ) -> ChatTurnResult {
        // Obviously off-domain questions never reach the backends.
        if !verdict::in_scope(user_message) {
            info!("scope pre-check declined question");
            let mut conversation = assemble(history, user_message);
            conversation.push(Message::assistant(DECLINE_ANSWER, None));
            return ChatTurnResult {
                response: DECLINE_ANSWER.to_string(),
                tool_calls: vec![],
                conversation,
                verdict: None,
                attempt_scores: vec![],
            };
        }

        // Feedback accumulates on the base conversation across attempts;
        // discarded attempts' tool exchanges are not replayed.
        let mut base = assemble(history, user_message);
        let mut best: Option<Candidate> = None;
        let mut best_score: u8 = 0;
        let mut attempt_scores: Vec<u8> = Vec::new();
        let mut failure_issues: Vec<String> = Vec::new();

        for attempt in 0..=opts.max_retries {
            if attempt > 0 {
                debug!("retry attempt {}/{}", attempt, opts.max_retries);
            }

            let outcome = run_rounds(
                self.provider.as_ref(),
                &self.registry,
                base.clone(),
                self.model.as_deref(),
                self.temperature,
                self.max_tokens,
            )
            .await;

            let outcome = match outcome {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("attempt {} failed: {}", attempt, e);
                    attempt_scores.push(0);
                    failure_issues.push(format!("Attempt {} failed: {}", attempt + 1, e));
                    continue;
                }
            };

            let answer = collapse_repeats(&outcome.answer);
            let records = outcome.records;
            let mut conversation = outcome.conversation;
            conversation.push(Message::assistant(answer.clone(), None));

            // Answers that needed no external data carry nothing to ground;
            // return without a grading round.
            if !opts.enable_validation || records.is_empty() {
                return ChatTurnResult {
                    response: answer,
                    tool_calls: records,
                    conversation,
                    verdict: None,
                    attempt_scores,
                };
            }

            let verdict = self.validator.validate(user_message, &records, &answer).await;
            let score = verdict.score;
            attempt_scores.push(score);
            info!(
                "attempt {} scored {}/100 (threshold {})",
                attempt + 1,
                score,
                opts.validation_threshold
            );

            let issues = verdict.issues.clone();
            if score > best_score {
                best_score = score;
                best = Some(Candidate {
                    answer: answer.clone(),
                    records: records.clone(),
                    conversation: conversation.clone(),
                    verdict: verdict.clone(),
                });
            }

            if score >= opts.validation_threshold {
                return ChatTurnResult {
                    response: answer,
                    tool_calls: records,
                    conversation,
                    verdict: Some(verdict),
                    attempt_scores,
                };
            }

            if attempt < opts.max_retries {
                base.push(feedback_message(score, &issues));
            }
        }

        warn!(
            "max retries reached, returning best response (score: {})",
            best_score
        );

        match best {
            Some(candidate) => ChatTurnResult {
                response: candidate.answer,
                tool_calls: candidate.records,
                conversation: candidate.conversation,
                verdict: Some(candidate.verdict),
                attempt_scores,
            },
            None => {
                let mut issues = failure_issues;
                if issues.is_empty() {
                    issues.push("Failed to generate a reliable response after retries".into());
                }
                let mut conversation = base;
                conversation.push(Message::assistant(RETRY_EXHAUSTED_ANSWER, None));
                ChatTurnResult {
                    response: RETRY_EXHAUSTED_ANSWER.to_string(),
                    tool_calls: vec![],
                    conversation,
                    verdict: Some(Verdict::from_score(0, issues)),
                    attempt_scores,
                }
            }
        }
    }
}
