pub mod config;
pub mod desire;
pub mod error;
pub mod persona;
pub mod store;

pub use config::KokoroConfig;
pub use desire::{Desire, DesireStore};
pub use error::{CollaboratorKind, CoreError};
pub use persona::PersonaConfig;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Reference to a binary attachment carried by a turn (e.g. a camera frame).
///
/// The payload travels base64-encoded so conversation state stays a plain
/// JSON document. Stores are expected to strip heavy payloads before
/// persisting (see the gateway's sanitizer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub media_type: String,
    pub data_base64: String,
}

/// One turn of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<AttachmentRef>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            attachment: None,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            attachment: None,
        }
    }
}

/// Per-session conversation state: the short-term turn buffer plus the
/// compressed context produced by prior compaction passes.
///
/// Owned by the orchestrator (and the session store behind it). The memory
/// subsystem only consults it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationState {
    #[serde(default)]
    pub turns: Vec<Turn>,
    #[serde(default)]
    pub compressed_context: String,
}

impl ConversationState {
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty() && self.compressed_context.is_empty()
    }
}

/// A finished user/assistant exchange, the unit the memory extractor
/// operates on.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub user_text: String,
    pub assistant_text: String,
    /// Session the exchange came from, if any.
    pub session: Option<String>,
}

/// Summarization seam used by the context compactor.
///
/// Kept here (not in the reasoning crate) so the memory crate can depend on
/// the trait without pulling in the LLM providers.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Condense a conversation tail, given the previous summary, into a new
    /// compressed-context string.
    async fn summarize(&self, tail: &str, prior_summary: &str) -> anyhow::Result<String>;
}
