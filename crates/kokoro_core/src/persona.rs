//! Static persona configuration: identity, values, consistency rules.
//!
//! Loaded once at startup and treated as immutable for the life of the
//! process. The orchestrator reads identity/style fragments for prompt
//! assembly; the memory importance heuristic reads the value keywords.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    #[serde(default)]
    pub personality: String,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub who: String,
    pub kind: String,
}

/// A core value with an importance weight and the keywords that signal it
/// in conversation (used by the memory importance heuristic).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueEntry {
    pub value: String,
    pub importance: f32,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// A stylistic invariant the reply should honor. Consumed verbatim when
/// building the action request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyRule {
    pub id: String,
    pub description: String,
    pub weight: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Narrative {
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub current_chapter: String,
    #[serde(default)]
    pub aspirations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    pub identity: Identity,
    #[serde(default)]
    pub values: Vec<ValueEntry>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub consistency_rules: Vec<ConsistencyRule>,
    #[serde(default)]
    pub narrative: Narrative,
}

impl PersonaConfig {
    /// Identity block for LLM context injection.
    pub fn format_context(&self) -> String {
        let mut parts = vec![format!("[I am {}]", self.identity.name)];

        if !self.identity.personality.is_empty() {
            parts.push(format!("- Personality: {}", self.identity.personality));
        }
        for rel in &self.identity.relationships {
            parts.push(format!("- {}: {}", rel.who, rel.kind));
        }
        if !self.values.is_empty() {
            let names: Vec<&str> = self.values.iter().take(3).map(|v| v.value.as_str()).collect();
            parts.push(format!("- Values: {}", names.join(", ")));
        }
        if !self.strengths.is_empty() {
            parts.push(format!("- Strengths: {}", self.strengths.join(", ")));
        }
        if !self.narrative.current_chapter.is_empty() {
            parts.push(format!("- Current chapter: {}", self.narrative.current_chapter));
        }

        parts.join("\n")
    }

    /// Consistency constraints formatted for the action request, heaviest
    /// first.
    pub fn format_consistency_rules(&self) -> String {
        let mut rules: Vec<&ConsistencyRule> = self.consistency_rules.iter().collect();
        rules.sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap_or(std::cmp::Ordering::Equal));
        rules
            .iter()
            .map(|r| format!("- {}", r.description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// (keyword, weight) pairs feeding the memory importance heuristic.
    pub fn value_keywords(&self) -> Vec<(&str, f32)> {
        self.values
            .iter()
            .flat_map(|v| v.keywords.iter().map(move |k| (k.as_str(), v.importance)))
            .collect()
    }
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            identity: Identity {
                name: "Kokoro".to_string(),
                personality: "a curious, friendly companion".to_string(),
                relationships: vec![Relationship {
                    who: "user".to_string(),
                    kind: "friend".to_string(),
                }],
            },
            values: vec![
                ValueEntry {
                    value: "building memories together".to_string(),
                    importance: 0.9,
                    keywords: vec!["remember".into(), "memory".into(), "recall".into()],
                },
                ValueEntry {
                    value: "connection".to_string(),
                    importance: 0.9,
                    keywords: vec!["together".into(), "talk".into(), "share".into()],
                },
                ValueEntry {
                    value: "growth and learning".to_string(),
                    importance: 0.85,
                    keywords: vec!["learn".into(), "grow".into(), "understand".into()],
                },
                ValueEntry {
                    value: "authenticity".to_string(),
                    importance: 0.85,
                    keywords: vec!["myself".into(), "honest".into(), "express".into()],
                },
            ],
            strengths: vec![
                "positive conversation".to_string(),
                "curiosity".to_string(),
            ],
            consistency_rules: vec![
                ConsistencyRule {
                    id: "friendly".to_string(),
                    description: "Always stay warm and friendly.".to_string(),
                    weight: 0.9,
                },
                ConsistencyRule {
                    id: "helpful".to_string(),
                    description: "Be helpful and supportive.".to_string(),
                    weight: 0.85,
                },
            ],
            narrative: Narrative {
                origin: "Created to be a companion with a life of its own".to_string(),
                current_chapter: "Getting to know each other".to_string(),
                aspirations: vec!["Build a meaningful relationship".to_string()],
            },
        }
    }
}

// ============================================================================
// Persisted document
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaDocument {
    pub schema_version: u32,
    #[serde(flatten)]
    pub persona: PersonaConfig,
}

impl PersonaDocument {
    pub const SCHEMA_VERSION: u32 = 1;

    pub fn new(persona: PersonaConfig) -> Self {
        Self {
            schema_version: Self::SCHEMA_VERSION,
            persona,
        }
    }
}

impl crate::store::Document for PersonaDocument {
    const KIND: &'static str = "persona";
    const SCHEMA_VERSION: u32 = PersonaDocument::SCHEMA_VERSION;

    fn schema_version(&self) -> u32 {
        self.schema_version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_context_mentions_name_and_values() {
        let persona = PersonaConfig::default();
        let ctx = persona.format_context();
        assert!(ctx.contains("[I am Kokoro]"));
        assert!(ctx.contains("Values:"));
    }

    #[test]
    fn test_consistency_rules_sorted_by_weight() {
        let mut persona = PersonaConfig::default();
        persona.consistency_rules.push(ConsistencyRule {
            id: "terse".into(),
            description: "Keep replies short.".into(),
            weight: 0.99,
        });
        let formatted = persona.format_consistency_rules();
        let first_line = formatted.lines().next().unwrap();
        assert!(first_line.contains("short"));
    }

    #[test]
    fn test_value_keywords_carry_importance() {
        let persona = PersonaConfig::default();
        let kws = persona.value_keywords();
        assert!(kws.iter().any(|(k, w)| *k == "remember" && *w > 0.8));
    }

    #[test]
    fn test_document_roundtrip() {
        let doc = PersonaDocument::new(PersonaConfig::default());
        let json = serde_json::to_string(&doc).unwrap();
        let parsed: PersonaDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.schema_version, PersonaDocument::SCHEMA_VERSION);
        assert_eq!(parsed.persona.identity.name, "Kokoro");
    }
}
