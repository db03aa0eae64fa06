use thiserror::Error;

use crate::llm::LlmError;

/// Errors from repository operations (used by trait definitions in companion-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Why an exchange failed, as reported to the presentation layer.
///
/// Payloads are plain strings so the error can be cloned into events.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    /// No usable credential. Nothing was sent.
    #[error("not configured: {0}")]
    Configuration(String),

    /// Network or stream failure. Safe to retry the whole exchange.
    #[error("connection problem: {0}")]
    Transport(String),

    /// The completion request exceeded its deadline.
    #[error("timed out after {0}ms")]
    Timeout(u64),

    /// The finished reply could not be committed.
    #[error("could not save reply: {0}")]
    Persistence(String),
}

impl ExchangeError {
    /// Short stable code recorded as `SessionState::last_error_code`.
    pub fn code(&self) -> &'static str {
        match self {
            ExchangeError::Configuration(_) => "configuration",
            ExchangeError::Transport(_) => "transport",
            ExchangeError::Timeout(_) => "timeout",
            ExchangeError::Persistence(_) => "persistence",
        }
    }
}

impl From<&LlmError> for ExchangeError {
    fn from(err: &LlmError) -> Self {
        match err {
            LlmError::NotConfigured(msg) => ExchangeError::Configuration(msg.clone()),
            LlmError::AuthenticationFailed => {
                ExchangeError::Configuration("authentication failed".to_string())
            }
            LlmError::Timeout(ms) => ExchangeError::Timeout(*ms),
            other => ExchangeError::Transport(other.to_string()),
        }
    }
}

impl From<LlmError> for ExchangeError {
    fn from(err: LlmError) -> Self {
        ExchangeError::from(&err)
    }
}

/// Input rejected before an exchange is started.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("message is empty")]
    EmptyInput,

    #[error("session '{session}' does not belong to character '{character}'")]
    CharacterMismatch { character: String, session: String },
}

/// Errors from the UI event bridge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("a reply is already streaming")]
    Busy,

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_llm_error_classification() {
        let cfg: ExchangeError = LlmError::NotConfigured("no key".into()).into();
        assert_eq!(cfg.code(), "configuration");

        let auth: ExchangeError = LlmError::AuthenticationFailed.into();
        assert_eq!(auth.code(), "configuration");

        let timeout: ExchangeError = LlmError::Timeout(500).into();
        assert_eq!(timeout, ExchangeError::Timeout(500));

        let stream: ExchangeError = LlmError::Stream("reset".into()).into();
        assert_eq!(stream.code(), "transport");
        assert!(stream.to_string().contains("reset"));
    }

    #[test]
    fn test_bridge_error_wraps_pipeline_error() {
        let err: BridgeError = PipelineError::EmptyInput.into();
        assert_eq!(err.to_string(), "message is empty");
    }
}
