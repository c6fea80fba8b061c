//! Per-session conversation state storage.
//!
//! The core is agnostic to where session state lives — an external key-value
//! service, client-held payloads, or this in-memory store. Whatever the
//! backend, reads and writes are scoped per session id.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use kokoro_core::ConversationState;
use tokio::sync::RwLock;

const MAX_SESSION_ID_LEN: usize = 120;
const MAX_STORED_TURNS: usize = 120;
const MAX_TURN_CHARS: usize = 1800;
const MAX_CONTEXT_CHARS: usize = 24_000;

/// Session-keyed conversation state store.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Option<ConversationState>;
    async fn put(&self, session_id: &str, state: ConversationState);
}

/// Trim inbound session ids and fall back to a shared default.
pub fn normalize_session_id(session_id: Option<&str>) -> String {
    let trimmed = session_id.unwrap_or("").trim();
    if trimmed.is_empty() {
        return "default".to_string();
    }
    trimmed.chars().take(MAX_SESSION_ID_LEN).collect()
}

/// Bound a state for storage and transport: cap turn count and text length,
/// and strip binary attachments (a stored camera frame would bloat every
/// subsequent request).
pub fn sanitize_state(mut state: ConversationState) -> ConversationState {
    if state.turns.len() > MAX_STORED_TURNS {
        let drop = state.turns.len() - MAX_STORED_TURNS;
        state.turns.drain(..drop);
    }
    for turn in &mut state.turns {
        if turn.attachment.take().is_some() && turn.text.is_empty() {
            turn.text = "[image attached]".to_string();
        }
        if turn.text.chars().count() > MAX_TURN_CHARS {
            turn.text = truncate(&turn.text, MAX_TURN_CHARS);
        }
    }
    if state.compressed_context.chars().count() > MAX_CONTEXT_CHARS {
        state.compressed_context = truncate(&state.compressed_context, MAX_CONTEXT_CHARS);
    }
    state
}

fn truncate(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...[truncated]");
    out
}

// ============================================================================
// In-memory store
// ============================================================================

struct StoredSession {
    state: ConversationState,
    touched: Instant,
}

/// Process-local session store with oldest-first pruning.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, StoredSession>>,
    max_sessions: usize,
}

impl InMemorySessionStore {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions: max_sessions.max(1),
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &str) -> Option<ConversationState> {
        let mut sessions = self.sessions.write().await;
        let stored = sessions.get_mut(session_id)?;
        stored.touched = Instant::now();
        Some(stored.state.clone())
    }

    async fn put(&self, session_id: &str, state: ConversationState) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(
            session_id.to_string(),
            StoredSession {
                state: sanitize_state(state),
                touched: Instant::now(),
            },
        );

        while sessions.len() > self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, s)| s.touched)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    tracing::debug!(session = %id, "pruning oldest session");
                    sessions.remove(&id);
                }
                None => break,
            }
        }
    }
}
