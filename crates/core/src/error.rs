//! Error types for the brandforge domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error type; the top-level [`Error`]
//! groups them into the categories a run can fail with.

use thiserror::Error;

/// The top-level error type for all brandforge operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Configuration errors ---
    /// Missing or invalid brand section, unpriced model, missing reflection history.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Structured output ---
    /// The model answer could not be parsed or did not satisfy its schema.
    #[error("Validation error: {message}")]
    Validation { message: String, raw: String },

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Workflow invariants ---
    #[error("Workflow error: {message}")]
    Workflow { message: String },

    #[error("Run cancelled")]
    Cancelled,

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            raw: raw.into(),
        }
    }

    pub fn workflow(message: impl Into<String>) -> Self {
        Self::Workflow {
            message: message.into(),
        }
    }

    /// Short category label used in structured run failures.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::Provider(e) if e.is_transient() => "transient_provider",
            Self::Provider(_) => "provider",
            Self::Validation { .. } => "validation",
            Self::Tool(_) => "tool_execution",
            Self::Workflow { .. } => "workflow",
            Self::Cancelled => "cancelled",
            Self::Serialization(_) => "serialization",
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Rate limits, connection failures, timeouts and 5xx answers are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout(_) | Self::Network(_) => true,
            Self::ApiError { status_code, .. } => (500..600).contains(status_code),
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Knowledge store error: {0}")]
    Knowledge(#[from] KnowledgeError),

    #[error("Web search error: {0}")]
    Search(#[from] SearchError),
}

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Failed to load knowledge seed from {path}: {reason}")]
    Seed { path: String, reason: String },
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Search provider not configured: {0}")]
    NotConfigured(String),

    #[error("Search request failed: {0}")]
    RequestFailed(String),

    #[error("Search API returned status {status}: {body}")]
    Api { status: u16, body: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn transient_classification() {
        assert!(ProviderError::RateLimited { retry_after_secs: 1 }.is_transient());
        assert!(ProviderError::Timeout("slow".into()).is_transient());
        assert!(ProviderError::Network("reset".into()).is_transient());
        assert!(
            ProviderError::ApiError {
                status_code: 503,
                message: "unavailable".into()
            }
            .is_transient()
        );
        assert!(
            !ProviderError::ApiError {
                status_code: 400,
                message: "bad request".into()
            }
            .is_transient()
        );
        assert!(!ProviderError::AuthenticationFailed("nope".into()).is_transient());
    }

    #[test]
    fn error_kind_labels() {
        assert_eq!(Error::configuration("x").kind(), "configuration");
        assert_eq!(
            Error::from(ProviderError::Network("down".into())).kind(),
            "transient_provider"
        );
        assert_eq!(
            Error::from(ProviderError::ModelNotFound("m".into())).kind(),
            "provider"
        );
        assert_eq!(Error::validation("bad json", "{").kind(), "validation");
        assert_eq!(Error::Cancelled.kind(), "cancelled");
    }

    #[test]
    fn tool_error_wraps_search_error() {
        let err = Error::Tool(ToolError::Search(SearchError::Api {
            status: 502,
            body: "gateway".into(),
        }));
        assert!(err.to_string().contains("502"));
    }
}
