use crate::errors::PartbotError;
use crate::lookup::{PartFilter, PartRecord, StructuredLookup};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

const CONNECT_TIMEOUT_SECS: u64 = 10;
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Thin client for the structured parts-catalog service. Every call is a
/// read-only query; the service owns the schema and query logic.
pub struct CatalogClient {
    base_url: String,
    client: Client,
}

impl CatalogClient {
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

    async fn get_records(&self, url: String, query: &[(String, String)]) -> Result<Vec<PartRecord>> {
        debug!("catalog query: {} {:?}", url, query);
        let resp = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| PartbotError::Backend(format!("catalog service unreachable: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(
                PartbotError::Backend(format!("catalog service error ({}): {}", status, body))
                    .into(),
            );
        }

        resp.json::<Vec<PartRecord>>()
            .await
            .context("Failed to parse catalog response")
    }
}

#[async_trait]
impl StructuredLookup for CatalogClient {
    async fn part_by_id(&self, part_id: &str) -> Result<Option<PartRecord>> {
        let url = format!("{}/parts/{}", self.base_url, part_id);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PartbotError::Backend(format!("catalog service unreachable: {}", e)))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(
                PartbotError::Backend(format!("catalog service error ({}): {}", status, body))
                    .into(),
            );
        }

        let part = resp
            .json::<PartRecord>()
            .await
            .context("Failed to parse catalog part response")?;
        Ok(Some(part))
    }

    async fn search_parts(&self, filter: &PartFilter, limit: u32) -> Result<Vec<PartRecord>> {
        let mut query: Vec<(String, String)> = Vec::new();
        if let Some(v) = &filter.appliance_type {
            query.push(("appliance_type".into(), v.clone()));
        }
        if let Some(v) = &filter.brand {
            query.push(("brand".into(), v.clone()));
        }
        if let Some(v) = filter.min_price {
            query.push(("min_price".into(), v.to_string()));
        }
        if let Some(v) = filter.max_price {
            query.push(("max_price".into(), v.to_string()));
        }
        if let Some(v) = &filter.availability {
            query.push(("availability".into(), v.clone()));
        }
        query.push(("limit".into(), limit.to_string()));

        self.get_records(format!("{}/parts", self.base_url), &query)
            .await
    }

    async fn search_by_model_number(
        &self,
        model_number: &str,
        limit: u32,
    ) -> Result<Vec<PartRecord>> {
        let query = vec![("limit".to_string(), limit.to_string())];
        self.get_records(
            format!("{}/models/{}/parts", self.base_url, model_number),
            &query,
        )
        .await
    }

    async fn ping(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PartbotError::Backend(format!("catalog service unreachable: {}", e)))?;
        if !resp.status().is_success() {
            return Err(PartbotError::Backend(format!(
                "catalog health check failed ({})",
                resp.status()
            ))
            .into());
        }
        Ok(())
    }
}
