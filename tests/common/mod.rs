// Shared test helpers — not all items used by every test binary.
#![allow(unused)]

use async_trait::async_trait;
use partbot::agent::{ChatEngine, TurnOptions};
use partbot::lookup::{
    PartFilter, PartRecord, RepairGuide, ScoredPart, SemanticLookup, StructuredLookup,
};
use partbot::providers::base::{
    ChatRequest, LLMProvider, LLMResponse, Message, ToolCallRequest, ToolDefinition,
};
use partbot::tools::ToolRegistry;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<Message>,
    pub tools: Option<Vec<ToolDefinition>>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Scripted provider: pops canned responses in order, recording every call.
pub struct MockLLMProvider {
    responses: Arc<std::sync::Mutex<VecDeque<anyhow::Result<LLMResponse>>>>,
    pub calls: Arc<std::sync::Mutex<Vec<RecordedCall>>>,
}

impl MockLLMProvider {
    pub fn with_responses(responses: Vec<anyhow::Result<LLMResponse>>) -> Self {
        Self {
            responses: Arc::new(std::sync::Mutex::new(VecDeque::from(responses))),
            calls: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LLMProvider for MockLLMProvider {
    async fn chat(&self, req: ChatRequest<'_>) -> anyhow::Result<LLMResponse> {
        self.calls.lock().unwrap().push(RecordedCall {
            messages: req.messages,
            tools: req.tools,
            temperature: req.temperature,
            max_tokens: req.max_tokens,
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(text_response("Mock response")))
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }
}

// --- Response builders ---

pub fn text_response(content: &str) -> LLMResponse {
    LLMResponse {
        content: Some(content.to_string()),
        tool_calls: vec![],
        total_tokens: None,
    }
}

pub fn tool_response(calls: Vec<ToolCallRequest>) -> LLMResponse {
    LLMResponse {
        content: None,
        tool_calls: calls,
        total_tokens: None,
    }
}

pub fn tool_call(id: &str, name: &str, arguments: serde_json::Value) -> ToolCallRequest {
    ToolCallRequest {
        id: id.to_string(),
        name: name.to_string(),
        arguments,
    }
}

/// A grader verdict as the grading call would return it.
pub fn grader_response(score: u8, issues: &[&str]) -> LLMResponse {
    let issues: Vec<String> = issues.iter().map(|s| (*s).to_string()).collect();
    text_response(
        &serde_json::json!({
            "is_valid": score >= 70,
            "score": score,
            "issues": issues,
            "severity": if score >= 90 { "none" } else if score >= 70 { "minor" } else { "major" },
            "recommendation": if score >= 70 { "approve" } else if score >= 50 { "revise" } else { "reject" },
        })
        .to_string(),
    )
}

// --- Fake lookup backends ---

pub fn sample_part() -> PartRecord {
    PartRecord {
        part_id: "PS11752778".into(),
        part_name: "Refrigerator Door Shelf Bin".into(),
        mpn_id: Some("WPW10321304".into()),
        brand: "Whirlpool".into(),
        part_price: 44.95,
        availability: "In Stock".into(),
        install_difficulty: Some("Really Easy".into()),
        install_time: Some("Less than 15 minutes".into()),
        product_types: Some("Refrigerator WRS325FDAM04".into()),
        symptoms: Some("Door won't close | Shelf cracked".into()),
        replace_parts: Some("W10321302".into()),
        install_video_url: Some("https://www.youtube.com/watch?v=zSCNN6KpDE8".into()),
        product_url: "https://www.partselect.com/PS11752778".into(),
        appliance_type: "refrigerator".into(),
    }
}

pub struct FakeCatalog;

#[async_trait]
impl StructuredLookup for FakeCatalog {
    async fn part_by_id(&self, part_id: &str) -> anyhow::Result<Option<PartRecord>> {
        if part_id == "PS11752778" {
            Ok(Some(sample_part()))
        } else {
            Ok(None)
        }
    }

    async fn search_parts(
        &self,
        _filter: &PartFilter,
        _limit: u32,
    ) -> anyhow::Result<Vec<PartRecord>> {
        Ok(vec![sample_part()])
    }

    async fn search_by_model_number(
        &self,
        _model_number: &str,
        _limit: u32,
    ) -> anyhow::Result<Vec<PartRecord>> {
        Ok(vec![sample_part()])
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

pub struct FakeVector;

#[async_trait]
impl SemanticLookup for FakeVector {
    async fn search_parts(
        &self,
        _query: &str,
        _filter: &PartFilter,
        _limit: u32,
    ) -> anyhow::Result<Vec<ScoredPart>> {
        Ok(vec![ScoredPart {
            part: sample_part(),
            similarity_score: 0.92,
        }])
    }

    async fn search_repairs(
        &self,
        _query: &str,
        _product: Option<&str>,
        _limit: u32,
    ) -> anyhow::Result<Vec<RepairGuide>> {
        Ok(vec![RepairGuide {
            product: "Refrigerator".into(),
            symptom: "Ice maker not making ice".into(),
            description: "Check the water inlet valve and the fill tube for ice blockages.".into(),
            difficulty: Some("EASY".into()),
            percentage: Some(29),
            symptom_url: Some("https://www.partselect.com/Repair/Refrigerator/Ice-Maker/".into()),
            similarity_score: Some(0.88),
        }])
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

pub fn test_registry() -> ToolRegistry {
    ToolRegistry::new(Arc::new(FakeCatalog), Arc::new(FakeVector))
}

pub fn engine_with(provider: Arc<MockLLMProvider>) -> ChatEngine {
    ChatEngine::new(provider, test_registry())
}
