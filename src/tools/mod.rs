use crate::errors::PartbotError;
use crate::lookup::{PartFilter, SemanticLookup, StructuredLookup};
use crate::providers::base::{ToolCallRequest, ToolDefinition};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

const DEFAULT_SEMANTIC_LIMIT: u32 = 5;
const DEFAULT_FILTERED_LIMIT: u32 = 10;
const DEFAULT_MODEL_LIMIT: u32 = 10;
const DEFAULT_REPAIR_LIMIT: u32 = 3;

/// The closed set of callable operations. Adding a tool means adding a
/// variant here; there is no runtime string table to fall out of sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolId {
    GetPartById,
    SearchPartsSemantic,
    SearchPartsFiltered,
    SearchByModelNumber,
    SearchRepairGuides,
}

impl ToolId {
    pub const ALL: [ToolId; 5] = [
        ToolId::GetPartById,
        ToolId::SearchPartsSemantic,
        ToolId::SearchPartsFiltered,
        ToolId::SearchByModelNumber,
        ToolId::SearchRepairGuides,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolId::GetPartById => "get_part_by_id",
            ToolId::SearchPartsSemantic => "search_parts_semantic",
            ToolId::SearchPartsFiltered => "search_parts_filtered",
            ToolId::SearchByModelNumber => "search_by_model_number",
            ToolId::SearchRepairGuides => "search_repair_guides",
        }
    }

    pub fn parse(name: &str) -> Option<ToolId> {
        Self::ALL.into_iter().find(|id| id.name() == name)
    }

    fn required_params(self) -> &'static [&'static str] {
        match self {
            ToolId::GetPartById => &["part_id"],
            ToolId::SearchPartsSemantic | ToolId::SearchRepairGuides => &["query"],
            ToolId::SearchPartsFiltered => &[],
            ToolId::SearchByModelNumber => &["model_number"],
        }
    }

    /// Declaration handed to the generation backend.
    pub fn definition(self) -> ToolDefinition {
        let parameters = match self {
            ToolId::GetPartById => json!({
                "type": "object",
                "properties": {
                    "part_id": {
                        "type": "string",
                        "description": "The part ID (e.g., 'PS11752778')"
                    }
                },
                "required": ["part_id"]
            }),
            ToolId::SearchPartsSemantic => json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Natural language query describing the problem or symptom"
                    },
                    "appliance_type": {
                        "type": "string",
                        "enum": ["dishwasher", "refrigerator"],
                        "description": "Filter by appliance type if known"
                    },
                    "brand": {
                        "type": "string",
                        "description": "Filter by brand name if specified"
                    },
                    "max_price": {
                        "type": "number",
                        "description": "Maximum price filter if user mentions budget"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Max results to return (default 5)",
                        "default": 5
                    }
                },
                "required": ["query"]
            }),
            ToolId::SearchPartsFiltered => json!({
                "type": "object",
                "properties": {
                    "appliance_type": {
                        "type": "string",
                        "enum": ["dishwasher", "refrigerator"],
                        "description": "Type of appliance"
                    },
                    "brand": {
                        "type": "string",
                        "description": "Brand name (e.g., 'Whirlpool', 'GE')"
                    },
                    "min_price": {
                        "type": "number",
                        "description": "Minimum price in dollars"
                    },
                    "max_price": {
                        "type": "number",
                        "description": "Maximum price in dollars"
                    },
                    "availability": {
                        "type": "string",
                        "description": "Availability status (e.g., 'In Stock')"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Max results (default 10)",
                        "default": 10
                    }
                }
            }),
            ToolId::SearchByModelNumber => json!({
                "type": "object",
                "properties": {
                    "model_number": {
                        "type": "string",
                        "description": "Appliance model number (e.g., 'WDT780SAEM1')"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Max results (default 10)",
                        "default": 10
                    }
                },
                "required": ["model_number"]
            }),
            ToolId::SearchRepairGuides => json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Description of the repair problem"
                    },
                    "product": {
                        "type": "string",
                        "enum": ["Dishwasher", "Refrigerator"],
                        "description": "Appliance type"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Max results (default 3)",
                        "default": 3
                    }
                },
                "required": ["query"]
            }),
        };

        let description = match self {
            ToolId::GetPartById => {
                "Get detailed information about a specific part using its part ID (e.g., PS11752778). \
                 Use when user mentions an exact part number."
            }
            ToolId::SearchPartsSemantic => {
                "Semantic search for parts using natural language descriptions of problems or symptoms \
                 (e.g., 'dishwasher not draining', 'leaking ice maker'). Returns parts ranked by \
                 relevance. Use for symptom-based queries."
            }
            ToolId::SearchPartsFiltered => {
                "Search parts with specific filters like price range, brand, or availability. \
                 Use for structured queries without symptoms."
            }
            ToolId::SearchByModelNumber => {
                "Find parts compatible with a specific appliance model number (e.g., 'WDT780SAEM1'). \
                 Use when user provides a model number."
            }
            ToolId::SearchRepairGuides => {
                "Search for DIY repair guides and troubleshooting help. Use when user asks \
                 'how to fix' or wants repair instructions."
            }
        };

        ToolDefinition {
            name: self.name().to_string(),
            description: description.to_string(),
            parameters,
        }
    }
}

/// One executed lookup, kept verbatim for grading and for the turn result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub function: String,
    pub args: Value,
    pub result: Value,
}

/// Dispatch table from tool identifiers to the two injected lookup
/// backends. Built once at startup; every dispatch is a read-only query.
pub struct ToolRegistry {
    structured: Arc<dyn StructuredLookup>,
    semantic: Arc<dyn SemanticLookup>,
}

fn str_arg(args: &Value, key: &str) -> Option<String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(std::string::ToString::to_string)
}

fn f64_arg(args: &Value, key: &str) -> Option<f64> {
    args.get(key).and_then(Value::as_f64)
}

fn limit_arg(args: &Value, default: u32) -> u32 {
    args.get("limit")
        .and_then(Value::as_u64)
        .map_or(default, |v| v as u32)
}

fn backend_error(e: anyhow::Error) -> PartbotError {
    match e.downcast::<PartbotError>() {
        Ok(pe) => pe,
        Err(e) => PartbotError::Backend(e.to_string()),
    }
}

impl ToolRegistry {
    pub fn new(structured: Arc<dyn StructuredLookup>, semantic: Arc<dyn SemanticLookup>) -> Self {
        Self {
            structured,
            semantic,
        }
    }

    /// Returns all tool declarations, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<_> = ToolId::ALL.into_iter().map(ToolId::definition).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Execute one requested call against the matching lookup backend.
    ///
    /// Fails with `UnknownTool` for names outside the closed set and
    /// `InvalidArguments` when a required field is missing; the backend is
    /// trusted to handle bad filter values in its own payload.
    pub async fn dispatch(&self, call: &ToolCallRequest) -> Result<Value, PartbotError> {
        let Some(id) = ToolId::parse(&call.name) else {
            warn!("generation backend requested unknown tool: {}", call.name);
            return Err(PartbotError::UnknownTool(call.name.clone()));
        };

        let missing: Vec<&str> = id
            .required_params()
            .iter()
            .copied()
            .filter(|&p| call.arguments.get(p).is_none() || call.arguments[p].is_null())
            .collect();
        if !missing.is_empty() {
            warn!(
                "tool '{}' called with missing parameters: {:?}",
                call.name, missing
            );
            return Err(PartbotError::InvalidArguments {
                tool: call.name.clone(),
                message: format!("missing required parameter(s): {}", missing.join(", ")),
            });
        }

        debug!("dispatching tool '{}' with args {}", call.name, call.arguments);
        let args = &call.arguments;

        let result = match id {
            ToolId::GetPartById => {
                let part_id = str_arg(args, "part_id").unwrap_or_default();
                let part = self
                    .structured
                    .part_by_id(&part_id)
                    .await
                    .map_err(backend_error)?;
                serde_json::to_value(part)
            }
            ToolId::SearchPartsSemantic => {
                let query = str_arg(args, "query").unwrap_or_default();
                let filter = PartFilter {
                    appliance_type: str_arg(args, "appliance_type"),
                    brand: str_arg(args, "brand"),
                    max_price: f64_arg(args, "max_price"),
                    ..Default::default()
                };
                let hits = self
                    .semantic
                    .search_parts(&query, &filter, limit_arg(args, DEFAULT_SEMANTIC_LIMIT))
                    .await
                    .map_err(backend_error)?;
                serde_json::to_value(hits)
            }
            ToolId::SearchPartsFiltered => {
                let filter = PartFilter {
                    appliance_type: str_arg(args, "appliance_type"),
                    brand: str_arg(args, "brand"),
                    min_price: f64_arg(args, "min_price"),
                    max_price: f64_arg(args, "max_price"),
                    availability: str_arg(args, "availability"),
                };
                let parts = self
                    .structured
                    .search_parts(&filter, limit_arg(args, DEFAULT_FILTERED_LIMIT))
                    .await
                    .map_err(backend_error)?;
                serde_json::to_value(parts)
            }
            ToolId::SearchByModelNumber => {
                let model_number = str_arg(args, "model_number").unwrap_or_default();
                let parts = self
                    .structured
                    .search_by_model_number(&model_number, limit_arg(args, DEFAULT_MODEL_LIMIT))
                    .await
                    .map_err(backend_error)?;
                serde_json::to_value(parts)
            }
            ToolId::SearchRepairGuides => {
                let query = str_arg(args, "query").unwrap_or_default();
                let product = str_arg(args, "product");
                let guides = self
                    .semantic
                    .search_repairs(
                        &query,
                        product.as_deref(),
                        limit_arg(args, DEFAULT_REPAIR_LIMIT),
                    )
                    .await
                    .map_err(backend_error)?;
                serde_json::to_value(guides)
            }
        };

        result.map_err(|e| PartbotError::Internal(e.into()))
    }

    /// Reachability of both lookup backends, for health reporting.
    pub async fn backend_health(&self) -> (bool, bool) {
        let structured = self.structured.ping().await.is_ok();
        let semantic = self.semantic.ping().await.is_ok();
        (structured, semantic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::{PartRecord, RepairGuide, ScoredPart, sample_part};
    use async_trait::async_trait;

    struct FakeStructured;
    struct FakeSemantic;

    #[async_trait]
    impl StructuredLookup for FakeStructured {
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
            Ok(vec![])
        }

        async fn ping(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl SemanticLookup for FakeSemantic {
        async fn search_parts(
            &self,
            _query: &str,
            _filter: &PartFilter,
            limit: u32,
        ) -> anyhow::Result<Vec<ScoredPart>> {
            assert_eq!(limit, DEFAULT_SEMANTIC_LIMIT);
            Ok(vec![ScoredPart {
                part: sample_part(),
                similarity_score: 0.9,
            }])
        }

        async fn search_repairs(
            &self,
            _query: &str,
            _product: Option<&str>,
            _limit: u32,
        ) -> anyhow::Result<Vec<RepairGuide>> {
            Ok(vec![])
        }

        async fn ping(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new(Arc::new(FakeStructured), Arc::new(FakeSemantic))
    }

    fn call(name: &str, arguments: Value) -> ToolCallRequest {
        ToolCallRequest {
            id: "tc_1".into(),
            name: name.into(),
            arguments,
        }
    }

    #[test]
    fn every_tool_name_round_trips_through_parse() {
        for id in ToolId::ALL {
            assert_eq!(ToolId::parse(id.name()), Some(id));
        }
        assert_eq!(ToolId::parse("frobnicate"), None);
    }

    #[test]
    fn definitions_are_sorted_and_complete() {
        let defs = registry().definitions();
        assert_eq!(defs.len(), ToolId::ALL.len());
        let names: Vec<_> = defs.iter().map(|d| d.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
        assert!(names.contains(&"get_part_by_id"));
    }

    #[tokio::test]
    async fn dispatch_unknown_tool_is_typed_error() {
        let err = registry()
            .dispatch(&call("order_pizza", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, PartbotError::UnknownTool(name) if name == "order_pizza"));
    }

    #[tokio::test]
    async fn dispatch_missing_required_arg_is_invalid_arguments() {
        let err = registry()
            .dispatch(&call("get_part_by_id", json!({})))
            .await
            .unwrap_err();
        match err {
            PartbotError::InvalidArguments { tool, message } => {
                assert_eq!(tool, "get_part_by_id");
                assert!(message.contains("part_id"));
            }
            other => panic!("expected InvalidArguments, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn dispatch_part_by_id_returns_record_payload() {
        let result = registry()
            .dispatch(&call("get_part_by_id", json!({"part_id": "PS11752778"})))
            .await
            .unwrap();
        assert_eq!(result["part_name"], "Refrigerator Door Shelf Bin");
    }

    #[tokio::test]
    async fn dispatch_missing_part_yields_null_not_error() {
        let result = registry()
            .dispatch(&call("get_part_by_id", json!({"part_id": "PS000"})))
            .await
            .unwrap();
        assert!(result.is_null());
    }

    #[tokio::test]
    async fn dispatch_semantic_search_applies_default_limit() {
        let result = registry()
            .dispatch(&call(
                "search_parts_semantic",
                json!({"query": "ice maker not working"}),
            ))
            .await
            .unwrap();
        let hits = result.as_array().unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0]["similarity_score"].as_f64().unwrap() > 0.8);
    }

    #[tokio::test]
    async fn dispatch_empty_result_is_a_valid_payload() {
        let result = registry()
            .dispatch(&call(
                "search_by_model_number",
                json!({"model_number": "WDT780SAEM1"}),
            ))
            .await
            .unwrap();
        assert_eq!(result, json!([]));
    }
}
