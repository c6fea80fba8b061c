//! Unit tests for the memory store and the context compactor.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use kokoro_core::config::MemoryConfig;
use kokoro_core::{ConversationState, CoreError, Exchange, PersonaConfig, Summarizer, Turn};

use crate::record::{MemoryKind, MemoryRecord};
use crate::store::extract_keywords;
use crate::{CompactionPolicy, ContextCompactor, MemoryStore};

const DAY: i64 = 86_400;

fn store_with(config: MemoryConfig) -> MemoryStore {
    MemoryStore::new(config, &PersonaConfig::default())
}

fn exchange(user: &str, assistant: &str) -> Exchange {
    Exchange {
        user_text: user.to_string(),
        assistant_text: assistant.to_string(),
        session: Some("test".to_string()),
    }
}

fn record(content: &str, importance: f32, keywords: &[&str], created_at: i64) -> MemoryRecord {
    MemoryRecord::new(
        MemoryKind::Episodic,
        content,
        importance,
        keywords.iter().map(|s| s.to_string()).collect(),
        created_at,
        None,
    )
}

// ============================================================================
// Extraction
// ============================================================================

#[test]
fn test_extract_discards_small_talk() {
    let mut store = store_with(MemoryConfig::default());
    let created = store.extract(&exchange("hi", "hello!"), 0);
    assert!(created.is_none());
    assert!(store.is_empty());
}

#[test]
fn test_extract_keeps_personal_facts_as_semantic() {
    let mut store = store_with(MemoryConfig::default());
    let created = store.extract(
        &exchange(
            "My name is Mara and I work night shifts at the hospital, please remember that",
            "Got it, Mara — night shifts at the hospital. I'll remember.",
        ),
        0,
    );
    assert!(created.is_some());
    let rec = &store.records()[0];
    assert_eq!(rec.kind, MemoryKind::Semantic);
    assert!(rec.importance >= 0.55);
    assert!(rec.keywords.iter().any(|k| k == "hospital" || k == "mara"));
}

#[test]
fn test_extract_emotional_exchange() {
    let mut store = store_with(MemoryConfig {
        importance_threshold: 0.4,
        ..MemoryConfig::default()
    });
    store
        .extract(
            &exchange("I'm so excited, we finally got the house!", "That's wonderful news!"),
            0,
        )
        .unwrap();
    assert_eq!(store.records()[0].kind, MemoryKind::Emotional);
}

#[test]
fn test_keyword_extraction_skips_stopwords() {
    let kws = extract_keywords("the quick brown fox jumped over the lazy dog", 8);
    assert!(!kws.iter().any(|k| k == "the"));
    assert!(kws.iter().any(|k| k == "quick"));
}

// ============================================================================
// Retrieval
// ============================================================================

#[test]
fn test_retrieve_ranks_by_decayed_importance_times_overlap() {
    let mut store = store_with(MemoryConfig::default());
    store.insert(record("we planned the garden together", 0.9, &["garden"], 0), 0);
    store.insert(record("talked about trains briefly", 0.4, &["trains"], 0), 0);

    let results = store.retrieve("what about the garden", 5, 0);
    assert_eq!(results.len(), 1);
    assert!(results[0].content.contains("garden"));
}

#[test]
fn test_retrieve_zero_overlap_is_excluded() {
    let mut store = store_with(MemoryConfig::default());
    store.insert(record("we talked about sailing", 0.9, &["sailing"], 0), 0);
    assert!(store.retrieve("quantum physics", 5, 0).is_empty());
}

#[test]
fn test_retrieve_floor_means_residual_rank_not_exclusion() {
    let config = MemoryConfig::default();
    let floor = config.importance_floor;
    let mut store = store_with(config.clone());
    // Two years old: raw decay would be ~0, but the floor keeps it ranked.
    store.insert(record("the user's dog is called Biscuit", 0.95, &["biscuit"], 0), 0);

    let now = 730 * DAY;
    let rec = &store.records()[0];
    let decayed = rec.decayed_importance(now, config.decay_factor, floor);
    assert_eq!(decayed, floor);

    let results = store.retrieve("biscuit", 5, now);
    assert_eq!(results.len(), 1, "floored record must still be retrievable");
}

#[test]
fn test_retrieve_tie_broken_by_recency() {
    let mut store = store_with(MemoryConfig::default());
    store.insert(record("coffee ritual, the old note", 0.8, &["coffee"], 100), 100);
    store.insert(record("coffee ritual, the new note", 0.8, &["coffee"], 200), 200);

    let results = store.retrieve("coffee", 1, 200);
    assert!(results[0].content.contains("new"));
}

// ============================================================================
// Eviction
// ============================================================================

#[test]
fn test_capacity_is_never_exceeded() {
    let mut store = store_with(MemoryConfig {
        capacity: 100,
        ..MemoryConfig::default()
    });
    for i in 0..100 {
        store.insert(record(&format!("memory {}", i), 0.5, &[], i), i);
    }
    assert_eq!(store.len(), 100);

    // The 101st insert evicts exactly one record and lands back at capacity.
    store.insert(record("the newest memory", 0.9, &[], 1000), 1000);
    assert_eq!(store.len(), 100);
}

#[test]
fn test_eviction_removes_lowest_decayed_importance() {
    let mut store = store_with(MemoryConfig {
        capacity: 2,
        ..MemoryConfig::default()
    });
    store.insert(record("weak", 0.2, &[], 0), 0);
    store.insert(record("strong", 0.9, &[], 0), 0);
    store.insert(record("medium", 0.5, &[], 0), 0);

    assert_eq!(store.len(), 2);
    assert!(!store.records().iter().any(|r| r.content == "weak"));
}

#[test]
fn test_eviction_tie_breaks_oldest_first() {
    let mut store = store_with(MemoryConfig {
        capacity: 2,
        ..MemoryConfig::default()
    });
    store.insert(record("old twin", 0.5, &[], 100), 100);
    store.insert(record("young twin", 0.5, &[], 200), 200);
    store.insert(record("newcomer", 0.5, &[], 300), 300);

    assert!(!store.records().iter().any(|r| r.content == "old twin"));
    assert!(store.records().iter().any(|r| r.content == "young twin"));
}

#[test]
fn test_extract_triggers_eviction() {
    let mut store = store_with(MemoryConfig {
        capacity: 1,
        importance_threshold: 0.3,
        ..MemoryConfig::default()
    });
    store.insert(record("placeholder", 0.31, &[], 0), 0);
    store
        .extract(
            &exchange(
                "Please remember my birthday is in March, it's important to me",
                "I'll remember — March.",
            ),
            10,
        )
        .unwrap();
    assert_eq!(store.len(), 1);
    assert!(store.records()[0].content.contains("birthday"));
}

// ============================================================================
// Compaction
// ============================================================================

struct ScriptedSummarizer {
    calls: AtomicUsize,
}

#[async_trait]
impl Summarizer for ScriptedSummarizer {
    async fn summarize(&self, _tail: &str, _prior: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("summary of the early conversation".to_string())
    }
}

struct FailingSummarizer;

#[async_trait]
impl Summarizer for FailingSummarizer {
    async fn summarize(&self, _tail: &str, _prior: &str) -> anyhow::Result<String> {
        anyhow::bail!("model overloaded")
    }
}

fn long_conversation(turns: usize) -> ConversationState {
    let mut state = ConversationState::default();
    for i in 0..turns {
        if i % 2 == 0 {
            state.push(Turn::user(format!("user line {}", i)));
        } else {
            state.push(Turn::assistant(format!("assistant line {}", i)));
        }
    }
    state
}

fn compactor(summarizer: Arc<dyn Summarizer>) -> ContextCompactor {
    ContextCompactor::new(
        summarizer,
        CompactionPolicy {
            max_turns: 6,
            watermark: 4,
        },
    )
}

#[tokio::test]
async fn test_compaction_not_due_under_budget() {
    let c = compactor(Arc::new(ScriptedSummarizer { calls: AtomicUsize::new(0) }));
    let state = long_conversation(4);
    assert!(c.compact(&state).await.unwrap().is_none());
}

#[tokio::test]
async fn test_compaction_consumes_tail_and_merges_context() {
    let c = compactor(Arc::new(ScriptedSummarizer { calls: AtomicUsize::new(0) }));
    let mut state = long_conversation(10);
    state.compressed_context = "earlier summary".to_string();

    let outcome = c.compact(&state).await.unwrap().unwrap();
    assert_eq!(outcome.consumed, 6);
    assert!(outcome.compressed_context.starts_with("earlier summary"));
    assert!(outcome.compressed_context.contains("summary of the early conversation"));

    // Nothing applied yet.
    assert_eq!(state.turns.len(), 10);

    ContextCompactor::apply(&mut state, &outcome);
    assert_eq!(state.turns.len(), 4);
    assert_eq!(state.compressed_context, outcome.compressed_context);
    // The newest turns survived.
    assert!(state.turns[0].text.contains("line 6"));
}

#[tokio::test]
async fn test_compaction_failure_leaves_buffer_untouched() {
    let c = compactor(Arc::new(FailingSummarizer));
    let state = long_conversation(10);
    let before = state.clone();

    let err = c.compact(&state).await.unwrap_err();
    assert!(matches!(err, CoreError::Collaborator { .. }));
    assert_eq!(state.turns.len(), before.turns.len());
    assert_eq!(state.compressed_context, before.compressed_context);
}

#[tokio::test]
async fn test_compaction_idempotent_after_apply() {
    let summarizer = Arc::new(ScriptedSummarizer { calls: AtomicUsize::new(0) });
    let c = compactor(summarizer.clone());
    let mut state = long_conversation(10);

    let outcome = c.compact(&state).await.unwrap().unwrap();
    ContextCompactor::apply(&mut state, &outcome);

    // Already compacted, empty eligible tail → no-op, no collaborator call.
    assert!(c.compact(&state).await.unwrap().is_none());
    assert_eq!(summarizer.calls.load(Ordering::SeqCst), 1);
}
