pub mod catalog;
pub mod vector;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use catalog::CatalogClient;
pub use vector::VectorSearchClient;

/// One part record as served by the lookup backends. The field set is fixed
/// by the catalog service; both backends return the same shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartRecord {
    pub part_id: String,
    pub part_name: String,
    #[serde(default)]
    pub mpn_id: Option<String>,
    pub brand: String,
    pub part_price: f64,
    pub availability: String,
    #[serde(default)]
    pub install_difficulty: Option<String>,
    #[serde(default)]
    pub install_time: Option<String>,
    #[serde(default)]
    pub product_types: Option<String>,
    #[serde(default)]
    pub symptoms: Option<String>,
    #[serde(default)]
    pub replace_parts: Option<String>,
    #[serde(default)]
    pub install_video_url: Option<String>,
    pub product_url: String,
    pub appliance_type: String,
}

/// A part record annotated with nearest-neighbor similarity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPart {
    #[serde(flatten)]
    pub part: PartRecord,
    pub similarity_score: f32,
}

/// A DIY repair guide from the semantic repairs collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairGuide {
    pub product: String,
    pub symptom: String,
    pub description: String,
    #[serde(default)]
    pub difficulty: Option<String>,
    /// Share of owners reporting this symptom, in percent.
    #[serde(default)]
    pub percentage: Option<u32>,
    #[serde(default)]
    pub symptom_url: Option<String>,
    #[serde(default)]
    pub similarity_score: Option<f32>,
}

/// Structured filter shared by catalog and semantic part searches. All
/// fields are optional; absent fields do not constrain the query.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PartFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appliance_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability: Option<String>,
}

/// Exact-match and filtered queries over the parts catalog service.
///
/// The query logic lives in the remote service; this trait is the fixed
/// contract the orchestration engine calls it under.
#[async_trait]
pub trait StructuredLookup: Send + Sync {
    async fn part_by_id(&self, part_id: &str) -> anyhow::Result<Option<PartRecord>>;

    async fn search_parts(&self, filter: &PartFilter, limit: u32)
    -> anyhow::Result<Vec<PartRecord>>;

    async fn search_by_model_number(
        &self,
        model_number: &str,
        limit: u32,
    ) -> anyhow::Result<Vec<PartRecord>>;

    /// Cheap reachability probe for health reporting.
    async fn ping(&self) -> anyhow::Result<()>;
}

/// Nearest-neighbor search over precomputed embeddings of the same dataset.
#[async_trait]
pub trait SemanticLookup: Send + Sync {
    async fn search_parts(
        &self,
        query: &str,
        filter: &PartFilter,
        limit: u32,
    ) -> anyhow::Result<Vec<ScoredPart>>;

    async fn search_repairs(
        &self,
        query: &str,
        product: Option<&str>,
        limit: u32,
    ) -> anyhow::Result<Vec<RepairGuide>>;

    /// Cheap reachability probe for health reporting.
    async fn ping(&self) -> anyhow::Result<()>;
}

#[cfg(test)]
pub(crate) fn sample_part() -> PartRecord {
    PartRecord {
        part_id: "PS11752778".into(),
        part_name: "Refrigerator Door Shelf Bin".into(),
        mpn_id: Some("WPW10321304".into()),
        brand: "Whirlpool".into(),
        part_price: 44.95,
        availability: "In Stock".into(),
        install_difficulty: Some("Really Easy".into()),
        install_time: Some("Less than 15 minutes".into()),
        product_types: Some("Refrigerator WRS325FDAM04, WRS325FDAM02".into()),
        symptoms: Some("Door won't close | Shelf cracked".into()),
        replace_parts: Some("W10321302, W10321303".into()),
        install_video_url: Some("https://www.youtube.com/watch?v=zSCNN6KpDE8".into()),
        product_url: "https://www.partselect.com/PS11752778".into(),
        appliance_type: "refrigerator".into(),
    }
}
