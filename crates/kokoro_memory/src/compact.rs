//! Context compaction: folds an over-budget short-term buffer into the
//! per-session compressed context via the summarization collaborator.
//!
//! The compactor never mutates the buffer it reads. Callers apply the
//! returned outcome only after the new compressed context has been durably
//! stored — if the collaborator call fails, the original buffer stays
//! untouched and compaction is retried on a later tick.

use std::sync::Arc;

use kokoro_core::{CollaboratorKind, ConversationState, CoreError, Role, Summarizer};

/// Bounds for the short-term turn buffer.
#[derive(Debug, Clone, Copy)]
pub struct CompactionPolicy {
    /// Buffer size that triggers compaction.
    pub max_turns: usize,
    /// Newest turns kept verbatim; everything older is the eligible tail.
    pub watermark: usize,
}

impl CompactionPolicy {
    pub fn is_due(&self, state: &ConversationState) -> bool {
        state.turns.len() > self.max_turns
    }

    /// Number of oldest turns eligible for compaction.
    pub fn eligible_tail(&self, state: &ConversationState) -> usize {
        state.turns.len().saturating_sub(self.watermark)
    }
}

/// Result of a successful compaction: the merged compressed context and how
/// many turns it consumed. Nothing has been applied yet.
#[derive(Debug, Clone)]
pub struct CompactionOutcome {
    pub compressed_context: String,
    pub consumed: usize,
}

pub struct ContextCompactor {
    summarizer: Arc<dyn Summarizer>,
    policy: CompactionPolicy,
}

impl ContextCompactor {
    pub fn new(summarizer: Arc<dyn Summarizer>, policy: CompactionPolicy) -> Self {
        Self { summarizer, policy }
    }

    pub fn policy(&self) -> CompactionPolicy {
        self.policy
    }

    /// Compact the eligible tail of `state`, if any.
    ///
    /// Returns `Ok(None)` when the buffer is under budget or the tail is
    /// empty (running compaction on an already-compacted buffer is a no-op).
    /// Returns a collaborator error — with `state` untouched — when the
    /// summarizer fails.
    pub async fn compact(
        &self,
        state: &ConversationState,
    ) -> Result<Option<CompactionOutcome>, CoreError> {
        if !self.policy.is_due(state) {
            return Ok(None);
        }
        let consumed = self.policy.eligible_tail(state);
        if consumed == 0 {
            return Ok(None);
        }

        let tail_text = format_turns(&state.turns[..consumed]);
        if tail_text.trim().is_empty() {
            // Nothing textual to summarize; the turns can be dropped as-is.
            return Ok(Some(CompactionOutcome {
                compressed_context: state.compressed_context.clone(),
                consumed,
            }));
        }

        let summary = self
            .summarizer
            .summarize(&tail_text, &state.compressed_context)
            .await
            .map_err(|e| CoreError::collaborator(CollaboratorKind::Llm, e))?;

        let merged = if state.compressed_context.is_empty() {
            summary
        } else {
            format!("{}\n\n{}", state.compressed_context, summary)
        };

        tracing::debug!(consumed, "compacted short-term tail into context");
        Ok(Some(CompactionOutcome {
            compressed_context: merged,
            consumed,
        }))
    }

    /// Apply a previously returned outcome: drop the consumed turns and
    /// install the merged compressed context. Call only after the outcome has
    /// been durably stored.
    pub fn apply(state: &mut ConversationState, outcome: &CompactionOutcome) {
        state.turns.drain(..outcome.consumed.min(state.turns.len()));
        state.compressed_context = outcome.compressed_context.clone();
    }
}

/// Render turns for the summarization prompt.
fn format_turns(turns: &[kokoro_core::Turn]) -> String {
    turns
        .iter()
        .filter(|t| !t.text.trim().is_empty())
        .map(|t| {
            let who = match t.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            format!("{}: {}", who, t.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
