use thiserror::Error;

/// Typed error hierarchy for partbot.
///
/// Use at module boundaries (provider calls, tool dispatch, lookup clients,
/// config validation). Internal/leaf functions can continue using
/// `anyhow::Result` — the `Internal` variant allows seamless conversion via
/// the `?` operator.
#[derive(Debug, Error)]
pub enum PartbotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Provider error: {message}")]
    Provider { message: String, retryable: bool },

    #[error("Rate limit exceeded")]
    RateLimit { retry_after: Option<u64> },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Unknown tool '{0}'")]
    UnknownTool(String),

    #[error("Invalid arguments for tool '{tool}': {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("Lookup backend unavailable: {0}")]
    Backend(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PartbotError {
    /// Whether this error is transient and the operation could succeed on a
    /// later attempt. Tool misuse and config/auth problems are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider { retryable, .. } => *retryable,
            Self::RateLimit { .. } | Self::Backend(_) | Self::Internal(_) => true,
            Self::Auth(_)
            | Self::Config(_)
            | Self::UnknownTool(_)
            | Self::InvalidArguments { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_retryable_flag_is_respected() {
        let transient = PartbotError::Provider {
            message: "503".into(),
            retryable: true,
        };
        let permanent = PartbotError::Provider {
            message: "400".into(),
            retryable: false,
        };
        assert!(transient.is_retryable());
        assert!(!permanent.is_retryable());
    }

    #[test]
    fn tool_misuse_is_never_retryable() {
        assert!(!PartbotError::UnknownTool("frobnicate".into()).is_retryable());
        assert!(
            !PartbotError::InvalidArguments {
                tool: "get_part_by_id".into(),
                message: "missing required parameter 'part_id'".into(),
            }
            .is_retryable()
        );
    }

    #[test]
    fn backend_outage_is_retryable() {
        assert!(PartbotError::Backend("connection refused".into()).is_retryable());
        assert!(PartbotError::RateLimit { retry_after: None }.is_retryable());
    }
}
