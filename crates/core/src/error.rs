//! Error types for the Dendrite domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; the top-level `Error`
//! mirrors the turn failure taxonomy: protocol errors, tool execution
//! errors, turn-budget exhaustion, malformed model output, and client
//! disconnect are all distinct classes so callers can tell a looping model
//! apart from a broken tool or a closed browser tab.

use thiserror::Error;

/// The top-level error type for all Dendrite operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Protocol errors (fatal to the current turn) ---
    #[error("Stream contract violation: {0}")]
    ProtocolViolation(String),

    #[error("Unimplemented finish reason: {0}")]
    UnexpectedFinishReason(String),

    #[error("Stream ended unexpectedly")]
    StreamEnded,

    // --- Turn budget ---
    #[error("Max turns ({limit}) exceeded")]
    MaxTurnsExceeded { limit: u32 },

    // --- Model/schema mismatch ---
    #[error("Malformed model output: {0}")]
    MalformedOutput(String),

    // --- Clean early termination, not a turn failure ---
    #[error("Client disconnected")]
    Disconnected,

    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Toolkit errors ---
    #[error("Toolkit error: {0}")]
    Toolkit(#[from] ToolkitError),

    // --- Persistence errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Registry ---
    #[error("Unknown assistant: {0}")]
    UnknownAssistant(String),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error is a clean client-disconnect rather than a
    /// turn failure. Callers use this to skip error presentation.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Error::Disconnected)
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

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ToolkitError {
    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool server unavailable: {0}")]
    ServerUnavailable(String),

    #[error("Delegation depth exhausted while delegating to {0}")]
    DelegationDepthExceeded(String),

    #[error("Invalid tool schema: {0}")]
    InvalidSchema(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Chat not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt chat state: {0}")]
    Corrupt(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_turns_displays_limit() {
        let err = Error::MaxTurnsExceeded { limit: 10 };
        assert!(err.to_string().contains("10"));
    }

    #[test]
    fn disconnect_is_not_a_turn_failure() {
        assert!(Error::Disconnected.is_disconnect());
        assert!(!Error::StreamEnded.is_disconnect());
        assert!(!Error::MaxTurnsExceeded { limit: 2 }.is_disconnect());
    }

    #[test]
    fn provider_error_displays_status() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn toolkit_error_displays_tool_name() {
        let err = Error::Toolkit(ToolkitError::ExecutionFailed {
            tool_name: "delegate_task".into(),
            reason: "peer assistant failed".into(),
        });
        assert!(err.to_string().contains("delegate_task"));
    }
}
