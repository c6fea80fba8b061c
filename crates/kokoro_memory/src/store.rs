//! The long-term memory store: extraction, ranked retrieval, capacity
//! eviction.
//!
//! Extraction scores a finished exchange with a keyword/importance heuristic
//! (seeded with the persona's value keywords) — no semantic understanding is
//! attempted. Retrieval ranks by decayed importance × keyword overlap.
//! Eviction runs after every extraction, so the store never sits above
//! capacity.

use kokoro_core::config::MemoryConfig;
use kokoro_core::{Exchange, PersonaConfig};
use uuid::Uuid;

use crate::record::{MemoryKind, MemoryRecord};
use crate::{CompactionPolicy, MemoryDocument};

/// Common words that never become keywords.
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "that", "this", "with", "you", "your", "was", "are", "but", "not",
    "have", "has", "had", "about", "what", "when", "where", "how", "why", "who", "can",
    "could", "would", "should", "its", "just", "like", "really", "very", "there", "here",
    "from", "into", "been", "they", "them", "she", "him", "her", "his", "will", "did",
    "does", "don", "let", "lets", "some", "than", "then", "too",
];

/// Markers suggesting an emotionally charged exchange.
const EMOTION_MARKERS: &[&str] = &[
    "love", "happy", "glad", "excited", "thrilled", "sad", "miss", "afraid", "scared",
    "angry", "wonderful", "amazing", "upset", "proud", "grateful",
];

/// Markers suggesting a durable personal fact.
const FACT_MARKERS: &[&str] = &[
    "my name", "i am ", "i'm a ", "i live", "i work", "my favorite", "my birthday",
    "i was born", "my job", "i have a ", "allergic",
];

/// Markers explicitly asking for something to be remembered.
const RECALL_MARKERS: &[&str] = &["remember", "don't forget", "important", "note that"];

// ============================================================================
// Importance heuristic
// ============================================================================

/// Scores an exchange for long-term worthiness.
#[derive(Debug, Clone)]
pub struct ImportanceScorer {
    value_keywords: Vec<(String, f32)>,
}

impl ImportanceScorer {
    /// Seed the scorer with the persona's value keywords, so exchanges that
    /// touch what the persona cares about rank higher.
    pub fn from_persona(persona: &PersonaConfig) -> Self {
        Self {
            value_keywords: persona
                .value_keywords()
                .into_iter()
                .map(|(k, w)| (k.to_lowercase(), w))
                .collect(),
        }
    }

    /// Score one exchange: (importance, keywords, kind).
    pub fn score(&self, exchange: &Exchange) -> (f32, Vec<String>, MemoryKind) {
        let combined = format!("{}\n{}", exchange.user_text, exchange.assistant_text);
        let lower = combined.to_lowercase();

        let mut importance = 0.3f32;
        let mut kind = MemoryKind::Episodic;

        if EMOTION_MARKERS.iter().any(|m| lower.contains(m)) {
            importance += 0.15;
            kind = MemoryKind::Emotional;
        }
        if FACT_MARKERS.iter().any(|m| lower.contains(m)) {
            importance += 0.25;
            kind = MemoryKind::Semantic;
        }
        if RECALL_MARKERS.iter().any(|m| lower.contains(m)) {
            importance += 0.2;
        }
        if lower.split_whitespace().count() > 40 {
            importance += 0.1;
        }

        // Persona values: each matching keyword nudges the score, capped.
        let mut value_boost = 0.0f32;
        for (keyword, weight) in &self.value_keywords {
            if lower.contains(keyword.as_str()) {
                value_boost += 0.1 * weight;
            }
        }
        importance += value_boost.min(0.2);

        (importance.min(1.0), extract_keywords(&lower, 8), kind)
    }
}

/// Tokenize, drop stopwords and short tokens, rank by frequency (first
/// occurrence breaks ties), take the top `limit`.
pub fn extract_keywords(text: &str, limit: usize) -> Vec<String> {
    let mut counts: Vec<(String, usize, usize)> = Vec::new();
    for (pos, token) in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 3 && !STOPWORDS.contains(t))
        .enumerate()
    {
        match counts.iter_mut().find(|(t, _, _)| t.as_str() == token) {
            Some(entry) => entry.1 += 1,
            None => counts.push((token.to_string(), 1, pos)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    counts.into_iter().take(limit).map(|(t, _, _)| t).collect()
}

fn query_tokens(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 3)
        .map(|t| t.to_string())
        .collect()
}

// ============================================================================
// MemoryStore
// ============================================================================

#[derive(Debug, Clone)]
pub struct MemoryStore {
    records: Vec<MemoryRecord>,
    config: MemoryConfig,
    scorer: ImportanceScorer,
}

impl MemoryStore {
    pub fn new(config: MemoryConfig, persona: &PersonaConfig) -> Self {
        Self {
            records: Vec::new(),
            config,
            scorer: ImportanceScorer::from_persona(persona),
        }
    }

    pub fn from_document(doc: MemoryDocument, config: MemoryConfig, persona: &PersonaConfig) -> Self {
        Self {
            records: doc.records,
            config,
            scorer: ImportanceScorer::from_persona(persona),
        }
    }

    pub fn to_document(&self, now: i64) -> MemoryDocument {
        MemoryDocument {
            schema_version: MemoryDocument::SCHEMA_VERSION,
            updated_at: now,
            records: self.records.clone(),
        }
    }

    pub fn records(&self) -> &[MemoryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Short-term buffer policy derived from this store's configuration.
    pub fn compaction_policy(&self) -> CompactionPolicy {
        CompactionPolicy {
            max_turns: self.config.max_turns,
            watermark: self.config.compaction_watermark,
        }
    }

    /// Score a finished exchange; create a long-term record when it clears
    /// the importance threshold. Eviction runs immediately after, so the
    /// store never ends up above capacity. Returns the new record's id, or
    /// None when the exchange was discarded from long-term consideration.
    pub fn extract(&mut self, exchange: &Exchange, now: i64) -> Option<Uuid> {
        let (importance, keywords, kind) = self.scorer.score(exchange);
        if importance < self.config.importance_threshold {
            tracing::trace!(importance, "exchange below long-term threshold");
            return None;
        }

        let content = distill_content(exchange);
        let record = MemoryRecord::new(
            kind,
            content,
            importance,
            keywords,
            now,
            exchange.session.clone(),
        );
        let id = record.id;
        tracing::debug!(%id, ?kind, importance, "long-term memory created");
        self.records.push(record);
        self.enforce_capacity(now);
        Some(id)
    }

    /// Insert a pre-built record (used by tests and consolidation tooling).
    pub fn insert(&mut self, record: MemoryRecord, now: i64) {
        self.records.push(record);
        self.enforce_capacity(now);
    }

    /// Rank records against a query and return the top `k`.
    ///
    /// Score = decayed importance × keyword overlap. The decay floor keeps
    /// old records at residual rank rather than excluding them; records with
    /// zero overlap are simply not relevant. Ties go to the newer record.
    pub fn retrieve(&self, query: &str, k: usize, now: i64) -> Vec<&MemoryRecord> {
        let tokens = query_tokens(query);
        let mut scored: Vec<(f32, &MemoryRecord)> = self
            .records
            .iter()
            .filter_map(|r| {
                let overlap = r.keyword_overlap(&tokens);
                if overlap <= 0.0 {
                    return None;
                }
                let decayed = r.decayed_importance(
                    now,
                    self.config.decay_factor,
                    self.config.importance_floor,
                );
                Some((decayed * overlap, r))
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.1.created_at.cmp(&a.1.created_at))
        });
        scored.into_iter().take(k).map(|(_, r)| r).collect()
    }

    /// Formatted context block of the strongest recalled memories.
    pub fn recall_context(&self, query: &str, now: i64) -> String {
        let recalled = self.retrieve(query, self.config.retrieve_k, now);
        if recalled.is_empty() {
            return String::new();
        }
        let lines: Vec<String> = recalled.iter().map(|r| format!("- {}", r.content)).collect();
        format!("[Long-term memories]\n{}", lines.join("\n"))
    }

    /// Evict lowest-value records until the store fits capacity. Lowest
    /// decayed importance goes first; among equals the oldest goes first.
    fn enforce_capacity(&mut self, now: i64) {
        while self.records.len() > self.config.capacity {
            let victim = self
                .records
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    let da = a.decayed_importance(
                        now,
                        self.config.decay_factor,
                        self.config.importance_floor,
                    );
                    let db = b.decayed_importance(
                        now,
                        self.config.decay_factor,
                        self.config.importance_floor,
                    );
                    da.partial_cmp(&db)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then(a.created_at.cmp(&b.created_at))
                })
                .map(|(i, _)| i);

            match victim {
                Some(i) => {
                    let evicted = self.records.remove(i);
                    tracing::debug!(id = %evicted.id, importance = evicted.importance, "memory evicted");
                }
                None => break,
            }
        }
    }

    /// Explicit consolidation pass: write decayed importance back into the
    /// stored records. This is the only place stored importance is rewritten
    /// — plain reads always compute decay on the fly.
    pub fn consolidate(&mut self, now: i64) {
        for record in &mut self.records {
            record.importance = record.decayed_importance(
                now,
                self.config.decay_factor,
                self.config.importance_floor,
            );
        }
    }
}

/// Condense an exchange into record content: the user line carries the
/// signal, the reply is kept short.
fn distill_content(exchange: &Exchange) -> String {
    let user = exchange.user_text.trim();
    let assistant: String = exchange.assistant_text.chars().take(160).collect();
    if assistant.is_empty() {
        user.to_string()
    } else {
        format!("{} — {}", user, assistant.trim())
    }
}
