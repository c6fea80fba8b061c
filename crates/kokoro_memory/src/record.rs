//! Long-term memory records: importance- and keyword-scored distillations of
//! past exchanges.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    /// Something that happened ("we talked about the trip").
    Episodic,
    /// A durable fact ("the user works night shifts").
    Semantic,
    /// An emotional moment ("the user was thrilled about the news").
    Emotional,
}

/// A single long-term memory.
///
/// `content` and `kind` are immutable after creation. Stored `importance`
/// only changes through an explicit consolidation pass — reads compute the
/// decayed value on the fly instead of writing it back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: Uuid,
    pub kind: MemoryKind,
    pub content: String,
    pub importance: f32,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub created_at: i64,
    /// Session the source exchange belonged to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
}

impl MemoryRecord {
    pub fn new(
        kind: MemoryKind,
        content: impl Into<String>,
        importance: f32,
        keywords: Vec<String>,
        created_at: i64,
        session: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            content: content.into(),
            importance: importance.clamp(0.0, 1.0),
            keywords,
            created_at,
            session,
        }
    }

    /// Importance as of `now`: exponential decay per elapsed day, floored so
    /// an old but once-critical memory keeps a residual rank. The floor never
    /// raises a record above its stored importance.
    pub fn decayed_importance(&self, now: i64, decay_factor: f64, floor: f32) -> f32 {
        let elapsed_days = ((now - self.created_at).max(0)) as f64 / SECONDS_PER_DAY;
        let decayed = self.importance as f64 * decay_factor.powf(elapsed_days);
        (decayed as f32).max(floor.min(self.importance))
    }

    /// Weighted overlap between query tokens and this record. Keyword hits
    /// count double relative to plain content-word hits.
    pub fn keyword_overlap(&self, query_tokens: &[String]) -> f32 {
        if query_tokens.is_empty() {
            return 0.0;
        }
        let content_lower = self.content.to_lowercase();
        let mut overlap = 0.0;
        for token in query_tokens {
            if self.keywords.iter().any(|k| k.eq_ignore_ascii_case(token)) {
                overlap += 2.0;
            } else if content_lower
                .split(|c: char| !c.is_alphanumeric())
                .any(|w| w == token.as_str())
            {
                overlap += 1.0;
            }
        }
        overlap
    }
}

// ============================================================================
// Persisted document
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryDocument {
    pub schema_version: u32,
    pub updated_at: i64,
    pub records: Vec<MemoryRecord>,
}

impl MemoryDocument {
    pub const SCHEMA_VERSION: u32 = 1;

    pub fn empty(now: i64) -> Self {
        Self {
            schema_version: Self::SCHEMA_VERSION,
            updated_at: now,
            records: Vec::new(),
        }
    }
}

impl kokoro_core::store::Document for MemoryDocument {
    const KIND: &'static str = "memories";
    const SCHEMA_VERSION: u32 = MemoryDocument::SCHEMA_VERSION;

    fn schema_version(&self) -> u32 {
        self.schema_version
    }
}
