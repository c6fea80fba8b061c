//! Error taxonomy shared by every crate in the workspace.
//!
//! The split matters to callers: `RateLimited` means "try later",
//! `Collaborator` means an external system broke (the exchange failed but
//! nothing was mutated), `Persistence`/`Config` mean our own state is in
//! trouble.

use std::path::PathBuf;
use thiserror::Error;

/// Which external collaborator failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollaboratorKind {
    Llm,
    Tool,
    Voice,
}

impl std::fmt::Display for CollaboratorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollaboratorKind::Llm => write!(f, "llm"),
            CollaboratorKind::Tool => write!(f, "tool"),
            CollaboratorKind::Voice => write!(f, "voice"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed or missing persisted document at startup. Fatal.
    #[error("configuration error: {0}")]
    Config(String),

    /// Durable write failed even after retry. No partial state was left
    /// behind (writes go through write-new-then-replace).
    #[error("persistence failure for {path}: {message}")]
    Persistence { path: PathBuf, message: String },

    /// An external collaborator (LLM, tool host, voice) failed.
    #[error("{kind} collaborator failed: {message}")]
    Collaborator {
        kind: CollaboratorKind,
        message: String,
    },

    /// An autonomous tick arrived before the minimum interval elapsed.
    /// Pure guard: nothing was mutated, the caller should retry later.
    #[error("autonomous tick too soon, retry in {wait_secs:.1}s")]
    RateLimited { wait_secs: f64 },

    /// Reference to an unknown desire or capability id. Indicates a
    /// configuration mismatch, not a runtime condition.
    #[error("unknown {kind} id: {id}")]
    NotFound { kind: &'static str, id: String },
}

impl CoreError {
    pub fn collaborator(kind: CollaboratorKind, err: impl std::fmt::Display) -> Self {
        CoreError::Collaborator {
            kind,
            message: err.to_string(),
        }
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// True for errors the caller can resolve by simply waiting.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, CoreError::RateLimited { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_is_distinguishable() {
        let err = CoreError::RateLimited { wait_secs: 2.5 };
        assert!(err.is_rate_limit());
        assert!(!CoreError::Config("x".into()).is_rate_limit());
    }

    #[test]
    fn test_collaborator_display_names_kind() {
        let err = CoreError::collaborator(CollaboratorKind::Llm, "timeout");
        assert!(err.to_string().contains("llm"));
        assert!(err.to_string().contains("timeout"));
    }
}
