use crate::errors::PartbotError;
use serde_json::Value;
use tracing::{error, warn};

/// Common error handling for generation-backend HTTP responses.
///
/// Maps transport-level failures onto the typed error hierarchy so callers
/// can distinguish retryable outages from permanent misconfiguration.
pub struct ProviderErrorHandler;

impl ProviderErrorHandler {
    /// Parse an API error body and return a typed error.
    pub fn parse_api_error(status: u16, error_text: &str) -> PartbotError {
        let retryable = status == 500 || status == 502 || status == 503;

        if let Ok(error_json) = serde_json::from_str::<Value>(error_text)
            && let Some(err) = error_json.get("error")
        {
            let error_status = err
                .get("status")
                .or_else(|| err.get("type"))
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            let error_msg = err
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("Unknown error");
            return PartbotError::Provider {
                message: format!("API error ({}): {}", error_status, error_msg),
                retryable,
            };
        }

        PartbotError::Provider {
            message: format!("API error ({}): {}", status, error_text),
            retryable,
        }
    }

    fn handle_rate_limit(status: u16, retry_after: Option<u64>) -> PartbotError {
        if let Some(seconds) = retry_after {
            warn!("Rate limit hit. Retry after {} seconds", seconds);
        } else {
            warn!("Rate limit hit (status: {})", status);
        }
        PartbotError::RateLimit { retry_after }
    }

    fn handle_auth_error(status: u16, error_text: &str) -> PartbotError {
        warn!("Authentication error (status: {}): {}", status, error_text);
        PartbotError::Auth(format!(
            "Authentication failed. Please check your API key. Error: {}",
            error_text
        ))
    }

    /// Check an HTTP response for errors (rate limit, auth, generic API
    /// errors). Returns the response body as JSON on success, or a typed
    /// error on failure.
    pub async fn check_response(
        resp: reqwest::Response,
        provider: &str,
    ) -> Result<Value, anyhow::Error> {
        let status = resp.status();
        if !status.is_success() {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            let error_text = resp
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());

            error!("{} API request failed ({}): {}", provider, status, error_text);

            if status.as_u16() == 429 {
                return Err(Self::handle_rate_limit(status.as_u16(), retry_after).into());
            }
            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(Self::handle_auth_error(status.as_u16(), &error_text).into());
            }
            return Err(Self::parse_api_error(status.as_u16(), &error_text).into());
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to parse {} API response: {}", provider, e))?;

        // API-level errors can arrive with a 200 status
        if let Some(error_val) = json.get("error") {
            let error_text =
                serde_json::to_string(error_val).unwrap_or_else(|_| "Unknown error".to_string());
            error!("{} API error in response body: {}", provider, error_text);
            return Err(Self::parse_api_error(200, &error_text).into());
        }

        Ok(json)
    }
}
