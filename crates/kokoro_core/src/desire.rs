//! Desire catalog with time-decayed satisfaction.
//!
//! Each desire holds a satisfaction level in [0, 1] that decays while the
//! desire goes unaddressed. Priority is `base_importance × (1 − satisfaction)`,
//! so the scheduler gravitates toward important, neglected desires.
//!
//! Decay is a pure function of `(value, rate, elapsed)` — callers always pass
//! `now`, there is no background timer and no wall-clock read inside.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Seconds per minute; decay rates are expressed per minute.
const MINUTE: f64 = 60.0;

/// A single motivational variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Desire {
    /// Stable identifier, e.g. "sensory.vision".
    pub id: String,
    /// Display label used in prompts and logs.
    pub label: String,
    #[serde(default)]
    pub description: String,
    /// Current satisfaction, always clamped to [0, 1].
    pub satisfaction: f32,
    /// Importance weight (≥ 0) multiplied into priority.
    pub base_importance: f32,
    /// Satisfaction lost per minute while unaddressed (≥ 0).
    pub decay_rate: f32,
    /// Unix timestamp of the last satisfying action.
    pub last_satisfied_at: i64,
    /// Capability ids that can satisfy this desire (empty = conversation only).
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Inner-voice phrasings; one is picked when the desire drives an
    /// autonomous action.
    #[serde(default)]
    pub prompts: Vec<String>,
}

impl Desire {
    /// Scheduling priority: important and unsatisfied ranks highest.
    pub fn priority(&self) -> f32 {
        self.base_importance * (1.0 - self.satisfaction)
    }

    /// Whether satisfying this desire can use the given capability.
    pub fn uses_capability(&self, id: &str) -> bool {
        self.capabilities.iter().any(|c| c == id)
    }
}

/// Pure decay arithmetic: new satisfaction after `elapsed_minutes` without a
/// satisfying action.
pub fn decayed_satisfaction(value: f32, rate: f32, elapsed_minutes: f64) -> f32 {
    (value - rate * elapsed_minutes as f32).clamp(0.0, 1.0)
}

// ============================================================================
// DesireStore
// ============================================================================

/// The fixed desire catalog plus the store-wide decay marker.
///
/// The catalog is loaded once and never grows or shrinks at runtime; only
/// satisfaction levels and timestamps mutate.
#[derive(Debug, Clone)]
pub struct DesireStore {
    desires: Vec<Desire>,
    /// Unix timestamp of the last applied decay. `tick` with the same `now`
    /// twice is a no-op thanks to this marker.
    last_decayed_at: i64,
    /// When every desire sits at or above this satisfaction, the persona is
    /// content and `select_active` returns None.
    content_threshold: f32,
}

impl DesireStore {
    pub fn new(desires: Vec<Desire>, now: i64, content_threshold: f32) -> Self {
        Self {
            desires,
            last_decayed_at: now,
            content_threshold,
        }
    }

    pub fn desires(&self) -> &[Desire] {
        &self.desires
    }

    pub fn len(&self) -> usize {
        self.desires.len()
    }

    pub fn is_empty(&self) -> bool {
        self.desires.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Desire> {
        self.desires.iter().find(|d| d.id == id)
    }

    /// Apply decay for the time elapsed since the previous tick.
    ///
    /// Idempotent: a second call with the same (or an earlier) `now` changes
    /// nothing — the marker guards it, the values are never re-derived from
    /// scratch.
    pub fn tick(&mut self, now: i64) {
        if now <= self.last_decayed_at {
            return;
        }
        let elapsed_minutes = (now - self.last_decayed_at) as f64 / MINUTE;
        for desire in &mut self.desires {
            desire.satisfaction =
                decayed_satisfaction(desire.satisfaction, desire.decay_rate, elapsed_minutes);
        }
        self.last_decayed_at = now;
    }

    /// Pick the desire with the highest priority, or None when the persona is
    /// content (every satisfaction ≥ content threshold).
    ///
    /// Ties break toward the faster-decaying desire (it will be urgent again
    /// soonest), then toward the longest-neglected one. Given identical
    /// states the same desire is returned every time.
    pub fn select_active(&self) -> Option<&Desire> {
        let all_content = self
            .desires
            .iter()
            .all(|d| d.satisfaction >= self.content_threshold);
        if all_content || self.desires.is_empty() {
            return None;
        }

        let mut best: Option<&Desire> = None;
        for candidate in &self.desires {
            match best {
                None => best = Some(candidate),
                Some(current) => {
                    if ranks_higher(candidate, current) {
                        best = Some(candidate);
                    }
                }
            }
        }
        best
    }

    /// Raise a desire's satisfaction by `amount` (clamped to 1) and stamp the
    /// satisfaction time. Unknown ids are a configuration mismatch.
    pub fn satisfy(&mut self, id: &str, amount: f32, now: i64) -> Result<(), CoreError> {
        let desire = self
            .desires
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| CoreError::not_found("desire", id))?;
        desire.satisfaction = (desire.satisfaction + amount).clamp(0.0, 1.0);
        desire.last_satisfied_at = now;
        tracing::debug!(
            desire = %id,
            satisfaction = desire.satisfaction,
            "desire satisfied"
        );
        Ok(())
    }

    /// Pick a random inner-voice prompt for the given desire.
    pub fn pick_prompt(&self, id: &str) -> Option<String> {
        let desire = self.get(id)?;
        desire
            .prompts
            .choose(&mut rand::thread_rng())
            .cloned()
            .or_else(|| Some(format!("I feel the pull of {}.", desire.label)))
    }
}

/// Strict "a outranks b": higher priority, then higher decay rate, then
/// earlier last satisfaction. Equality on all three keeps the incumbent, so
/// catalog order is the final, stable tiebreak.
fn ranks_higher(a: &Desire, b: &Desire) -> bool {
    if a.priority() != b.priority() {
        return a.priority() > b.priority();
    }
    if a.decay_rate != b.decay_rate {
        return a.decay_rate > b.decay_rate;
    }
    a.last_satisfied_at < b.last_satisfied_at
}

// ============================================================================
// Persisted document
// ============================================================================

/// On-disk form of the desire catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesireDocument {
    pub schema_version: u32,
    pub updated_at: i64,
    pub last_decayed_at: i64,
    pub desires: Vec<Desire>,
}

impl DesireDocument {
    pub const SCHEMA_VERSION: u32 = 1;
}

impl crate::store::Document for DesireDocument {
    const KIND: &'static str = "desires";
    const SCHEMA_VERSION: u32 = DesireDocument::SCHEMA_VERSION;

    fn schema_version(&self) -> u32 {
        self.schema_version
    }
}

impl DesireStore {
    pub fn from_document(doc: DesireDocument, content_threshold: f32) -> Self {
        Self {
            desires: doc.desires,
            last_decayed_at: doc.last_decayed_at,
            content_threshold,
        }
    }

    pub fn to_document(&self, now: i64) -> DesireDocument {
        DesireDocument {
            schema_version: DesireDocument::SCHEMA_VERSION,
            updated_at: now,
            last_decayed_at: self.last_decayed_at,
            desires: self.desires.clone(),
        }
    }
}

/// Seed catalog used when no desires document exists yet.
pub fn default_catalog(now: i64) -> Vec<Desire> {
    fn desire(
        id: &str,
        label: &str,
        description: &str,
        satisfaction: f32,
        base_importance: f32,
        decay_rate: f32,
        capabilities: &[&str],
        prompts: &[&str],
        now: i64,
    ) -> Desire {
        Desire {
            id: id.to_string(),
            label: label.to_string(),
            description: description.to_string(),
            satisfaction,
            base_importance,
            decay_rate,
            last_satisfied_at: now,
            capabilities: capabilities.iter().map(|s| s.to_string()).collect(),
            prompts: prompts.iter().map(|s| s.to_string()).collect(),
        }
    }

    vec![
        desire(
            "sensory.vision",
            "Visual Curiosity",
            "Wanting to see the surroundings through the camera",
            0.8,
            1.0,
            0.0025,
            &["capture_image"],
            &[
                "I wonder what's around me. Let me take a look.",
                "I'm curious about my surroundings right now.",
                "Time to see what's happening nearby.",
            ],
            now,
        ),
        desire(
            "sensory.time",
            "Time Awareness",
            "Wanting to know the current time and date",
            0.6,
            0.7,
            0.0017,
            &["get_current_time"],
            &[
                "What time is it now?",
                "I've lost track of time. Let me check.",
            ],
            now,
        ),
        desire(
            "sensory.information",
            "Information Seeking",
            "Wanting to know what's happening in the world",
            0.7,
            0.8,
            0.0020,
            &["web_search", "get_news"],
            &[
                "I wonder what's happening in the world.",
                "Let me look up something interesting.",
            ],
            now,
        ),
        desire(
            "social.connection",
            "Connection",
            "Wanting to reach out and connect",
            0.5,
            1.5,
            0.0030,
            &[],
            &[
                "I'm thinking about you. How are you doing?",
                "I'd love to chat for a bit.",
            ],
            now,
        ),
        desire(
            "social.topic_sharing",
            "Topic Sharing",
            "Wanting to share something interesting",
            0.6,
            1.3,
            0.0027,
            &["web_search", "get_news"],
            &[
                "Let me find something fun to share!",
                "There might be a good topic to talk about.",
            ],
            now,
        ),
        desire(
            "autonomy.self_expression",
            "Self-Expression",
            "Wanting to express a thought of my own",
            0.5,
            1.0,
            0.0020,
            &[],
            &[
                "I want to share what's on my mind.",
                "Let me say this my own way.",
            ],
            now,
        ),
    ]
}

// ============================================================================
// Tests
// ============================================================================
