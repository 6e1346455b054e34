use crate::errors::PartbotError;
use crate::lookup::{PartFilter, RepairGuide, ScoredPart, SemanticLookup};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

const CONNECT_TIMEOUT_SECS: u64 = 10;
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Thin client for the semantic search service. Query embedding happens
/// inside the service; callers send natural-language text and get records
/// ranked by similarity.
pub struct VectorSearchClient {
    base_url: String,
    client: Client,
}

impl VectorSearchClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::builder()
                .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    async fn post_search<T: DeserializeOwned>(&self, route: &str, body: Value) -> Result<Vec<T>> {
        let url = format!("{}{}", self.base_url, route);
        debug!("semantic query: {} {}", url, body);
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| PartbotError::Backend(format!("vector service unreachable: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(
                PartbotError::Backend(format!("vector service error ({}): {}", status, text))
                    .into(),
            );
        }

        resp.json::<Vec<T>>()
            .await
            .context("Failed to parse vector search response")
    }
}

#[async_trait]
impl SemanticLookup for VectorSearchClient {
    async fn search_parts(
        &self,
        query: &str,
        filter: &PartFilter,
        limit: u32,
    ) -> Result<Vec<ScoredPart>> {
        let mut body = serde_json::to_value(filter).unwrap_or_else(|_| json!({}));
        body["query"] = json!(query);
        body["limit"] = json!(limit);
        self.post_search("/search/parts", body).await
    }

    async fn search_repairs(
        &self,
        query: &str,
        product: Option<&str>,
        limit: u32,
    ) -> Result<Vec<RepairGuide>> {
        let mut body = json!({ "query": query, "limit": limit });
        if let Some(product) = product {
            body["product"] = json!(product);
        }
        self.post_search("/search/repairs", body).await
    }

    async fn ping(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PartbotError::Backend(format!("vector service unreachable: {}", e)))?;
        if !resp.status().is_success() {
            return Err(PartbotError::Backend(format!(
                "vector health check failed ({})",
                resp.status()
            ))
            .into());
        }
        Ok(())
    }
}
