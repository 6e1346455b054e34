use crate::providers::base::{ChatRequest, LLMProvider, Message, ResponseFormat};
use crate::tools::ToolCallRecord;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

const GRADING_MAX_TOKENS: u32 = 1024;
const GRADING_TEMPERATURE: f32 = 0.1;

/// Score given to the conservative default verdict when the grading call
/// itself fails. Sits in the approve band so a broken grader can never
/// hold correct answers hostage through the retry loop.
const GRADING_FALLBACK_SCORE: u8 = 70;

const VALIDATION_PROMPT: &str = "\
You are a validation agent that checks if responses are grounded in retrieved data and \
within scope.

Your job is to analyze:
1. USER QUERY: The original user question
2. TOOL RESULTS: Data retrieved from the parts catalog and semantic search
3. AGENT RESPONSE: The response given to the user

Validation Checks:

1. GROUNDING CHECK:
   - Are all facts (prices, part names, availability) directly from tool results?
   - Are there any invented details not present in tool results?
   - Are numerical values (prices, times) exact matches?

2. SCOPE CHECK:
   - Is the response about dishwasher or refrigerator parts only?
   - Does it decline off-topic questions politely?

3. URL CHECK:
   - If parts are mentioned, is product_url included?
   - If installation is mentioned, is install_video_url included (if available)?
   - Are URLs from the tool results, not invented?

4. COMPLETENESS CHECK:
   - Are key details provided (name, price, brand, availability)?
   - Is the response helpful and answers the user's question?

Return JSON with:
{
    \"is_valid\": true/false,
    \"score\": 0-100 (quality score),
    \"issues\": [list of problems found, empty if valid],
    \"severity\": \"none\" | \"minor\" | \"major\",
    \"recommendation\": \"approve\" | \"revise\" | \"reject\"
}

Score breakdown:
- 90-100: Perfect, all details correct and complete
- 70-89: Good, minor issues but acceptable
- 50-69: Fair, needs revision
- 0-49: Poor, reject and regenerate";

const VALIDATION_ACK: &str =
    "I understand. I will validate responses against tool results to check for grounding, \
     scope, URLs, and completeness.";

/// Queries that are clearly outside the appliance-parts domain. The list is
/// deliberately short and the check deliberately permissive: a false
/// rejection costs more than an extra grading round.
const OFF_TOPIC_KEYWORDS: [&str; 17] = [
    "weather",
    "news",
    "sports",
    "politics",
    "recipe",
    "movie",
    "book",
    "song",
    "game",
    "joke",
    "story",
    "poem",
    "washing machine",
    "dryer",
    "oven",
    "microwave",
    "stove",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Minor,
    Major,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Approve,
    Revise,
    Reject,
}

/// Structured judgment of one candidate answer. Severity, recommendation,
/// and validity are all functions of the score band, so a verdict can never
/// carry contradictory fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub score: u8,
    pub is_valid: bool,
    pub severity: Severity,
    pub issues: Vec<String>,
    pub recommendation: Recommendation,
}

impl Verdict {
    pub fn from_score(score: u8, issues: Vec<String>) -> Self {
        let score = score.min(100);
        let severity = match score {
            90..=100 => Severity::None,
            70..=89 => Severity::Minor,
            _ => Severity::Major,
        };
        let recommendation = match score {
            70..=100 => Recommendation::Approve,
            50..=69 => Recommendation::Revise,
            _ => Recommendation::Reject,
        };
        Self {
            score,
            is_valid: score >= 70,
            severity,
            issues,
            recommendation,
        }
    }
}

/// Returns false only for clearly off-topic queries; anything ambiguous is
/// left for the engine (and the grader) to handle.
pub fn in_scope(question: &str) -> bool {
    let lower = question.to_lowercase();
    !OFF_TOPIC_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// Scores candidate answers against the tool results that produced them,
/// via a second JSON-constrained call to the generation backend.
pub struct Validator {
    provider: Arc<dyn LLMProvider>,
    model: Option<String>,
}

impl Validator {
    pub fn new(provider: Arc<dyn LLMProvider>, model: Option<String>) -> Self {
        Self { provider, model }
    }

    /// Grade an answer. Grading failures are absorbed into a conservative
    /// default verdict — a broken grader must never block the turn.
    pub async fn validate(
        &self,
        question: &str,
        tool_results: &[ToolCallRecord],
        answer: &str,
    ) -> Verdict {
        match self.grade(question, tool_results, answer).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!("grading call failed, approving conservatively: {}", e);
                Verdict::from_score(
                    GRADING_FALLBACK_SCORE,
                    vec![format!("Validation check failed: {}", e)],
                )
            }
        }
    }

    async fn grade(
        &self,
        question: &str,
        tool_results: &[ToolCallRecord],
        answer: &str,
    ) -> Result<Verdict> {
        let results_json = serde_json::to_string_pretty(tool_results)
            .context("Failed to serialize tool results for grading")?;
        let request = format!(
            "USER QUERY:\n{}\n\nTOOL RESULTS:\n{}\n\nAGENT RESPONSE:\n{}\n\n\
             Validate the response and return JSON.",
            question, results_json, answer
        );

        let response = self
            .provider
            .chat(ChatRequest {
                messages: vec![
                    Message::user(VALIDATION_PROMPT),
                    Message::assistant(VALIDATION_ACK, None),
                    Message::user(request),
                ],
                tools: None,
                model: self.model.as_deref(),
                max_tokens: GRADING_MAX_TOKENS,
                temperature: GRADING_TEMPERATURE,
                response_format: Some(ResponseFormat::JsonObject),
            })
            .await?;

        let text = response.content.context("Grading call returned no text")?;
        let parsed = extract_json(&text)
            .with_context(|| format!("Grading call returned non-JSON output: {}", text))?;

        let score = parsed
            .get("score")
            .and_then(Value::as_u64)
            .context("Grading output has no numeric 'score'")?;
        let issues = parsed
            .get("issues")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(std::string::ToString::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let verdict = Verdict::from_score(score.min(100) as u8, issues);
        debug!(
            "graded answer: score={} severity={:?} issues={}",
            verdict.score,
            verdict.severity,
            verdict.issues.len()
        );
        Ok(verdict)
    }
}

/// Pull a JSON object out of grader output, tolerating code fences and
/// prose around the object.
fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}
