//! Error types for ApplyKit

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while processing an application
#[derive(Debug, Error)]
pub enum ApplyError {
    /// URL failed validation before any network call
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Page fetch failed (network, timeout, bad status)
    #[error("Scrape failed: {0}")]
    Scrape(String),

    /// LLM call failed in a way worth retrying (timeout, rate limit, 5xx)
    #[error("LLM service unavailable: {message}")]
    LlmTransient {
        /// HTTP status, when the failure came from a response
        status: Option<u16>,
        message: String,
        /// Correlation id, stamped by the client once a call is underway
        request_id: Option<Uuid>,
    },

    /// LLM call failed in a way retries cannot fix (auth, bad request)
    #[error("LLM request rejected: {message}")]
    LlmFatal {
        message: String,
        /// Correlation id, stamped by the client once a call is underway
        request_id: Option<Uuid>,
    },

    /// LLM responded but no JSON payload could be extracted
    #[error("No JSON found in LLM response")]
    LlmParse {
        /// Raw response text, kept for diagnostics
        raw: String,
        /// Correlation id, stamped by the client once a call is underway
        request_id: Option<Uuid>,
    },

    /// Writing results to disk failed
    #[error("Failed to persist results")]
    Persist(#[source] std::io::Error),

    /// Failed to build the HTTP client
    #[error("Failed to create HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    /// Bad or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ApplyError {
    /// Classify a reqwest error from an LLM call
    pub fn from_llm_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            ApplyError::LlmTransient {
                status: None,
                message: err.to_string(),
                request_id: None,
            }
        } else {
            ApplyError::LlmFatal {
                message: err.to_string(),
                request_id: None,
            }
        }
    }

    /// Classify an LLM HTTP status code
    pub fn from_llm_status(status: u16, body: String) -> Self {
        match status {
            408 | 429 | 500..=599 => ApplyError::LlmTransient {
                status: Some(status),
                message: body,
                request_id: None,
            },
            _ => ApplyError::LlmFatal {
                message: format!("status {status}: {body}"),
                request_id: None,
            },
        }
    }

    /// True if the adapter should retry this failure with backoff
    pub fn is_transient(&self) -> bool {
        matches!(self, ApplyError::LlmTransient { .. })
    }

    /// Correlation id of the LLM call this failure came from, if any
    pub fn request_id(&self) -> Option<Uuid> {
        match self {
            ApplyError::LlmTransient { request_id, .. }
            | ApplyError::LlmFatal { request_id, .. }
            | ApplyError::LlmParse { request_id, .. } => *request_id,
            _ => None,
        }
    }

    /// Stamp the LLM call's correlation id onto an LLM failure.
    pub(crate) fn with_request_id(mut self, id: Uuid) -> Self {
        match &mut self {
            ApplyError::LlmTransient { request_id, .. }
            | ApplyError::LlmFatal { request_id, .. }
            | ApplyError::LlmParse { request_id, .. } => *request_id = Some(id),
            _ => {}
        }
        self
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ApplyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(ApplyError::from_llm_status(429, String::new()).is_transient());
        assert!(ApplyError::from_llm_status(503, String::new()).is_transient());
        assert!(ApplyError::from_llm_status(408, String::new()).is_transient());
        assert!(!ApplyError::from_llm_status(401, String::new()).is_transient());
        assert!(!ApplyError::from_llm_status(400, String::new()).is_transient());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ApplyError::InvalidUrl("missing scheme".into()).to_string(),
            "Invalid URL: missing scheme"
        );
        assert_eq!(
            ApplyError::LlmParse {
                raw: "prose".into(),
                request_id: None
            }
            .to_string(),
            "No JSON found in LLM response"
        );
    }

    #[test]
    fn test_request_id_stamping() {
        let id = Uuid::new_v4();
        let err = ApplyError::from_llm_status(503, "overloaded".into());
        assert_eq!(err.request_id(), None);
        assert_eq!(err.with_request_id(id).request_id(), Some(id));

        // Non-LLM failures never carry one
        let err = ApplyError::InvalidUrl("nope".into()).with_request_id(id);
        assert_eq!(err.request_id(), None);
    }
}
