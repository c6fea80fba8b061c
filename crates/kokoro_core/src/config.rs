use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KokoroConfig {
    pub llm: LlmConfig,
    pub agent: AgentConfig,
    pub memory: MemoryConfig,
    pub tts: TtsConfig,
    pub web: WebConfig,
}

impl KokoroConfig {
    /// Load config from a TOML file, falling back to defaults for missing
    /// fields, then apply env var overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: KokoroConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if the file doesn't exist, return defaults with
    /// env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("KOKORO_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("KOKORO_MAX_TOKENS") {
            if let Ok(n) = v.parse() {
                self.llm.max_tokens = n;
            }
        }
        if let Ok(v) = std::env::var("KOKORO_DATA_DIR") {
            self.agent.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("KOKORO_TIMEZONE") {
            self.agent.timezone = v;
        }
        if let Ok(v) = std::env::var("KOKORO_MIN_TICK_INTERVAL_SECS") {
            if let Ok(n) = v.parse() {
                self.agent.min_tick_interval_secs = n;
            }
        }
        if let Ok(v) = std::env::var("ELEVENLABS_VOICE_ID") {
            self.tts.voice_id = Some(v);
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 4096,
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Directory holding the three state documents.
    pub data_dir: PathBuf,
    pub desires_file: String,
    pub memories_file: String,
    pub persona_file: String,
    /// When every desire's satisfaction is at or above this, the persona is
    /// content and autonomous ticks go idle.
    pub content_threshold: f32,
    /// Satisfaction added when an action serves the selected desire.
    pub satisfy_amount: f32,
    /// Minimum seconds between completed autonomous ticks.
    pub min_tick_interval_secs: f64,
    /// Interval of the CLI autonomous loop.
    pub autonomous_interval_secs: f64,
    /// IANA timezone name for system time notices.
    pub timezone: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            desires_file: "desires.json".to_string(),
            memories_file: "memories.json".to_string(),
            persona_file: "persona.json".to_string(),
            content_threshold: 0.92,
            satisfy_amount: 0.8,
            min_tick_interval_secs: 3.0,
            autonomous_interval_secs: 30.0,
            timezone: "Asia/Tokyo".to_string(),
        }
    }
}

impl AgentConfig {
    pub fn desires_path(&self) -> PathBuf {
        self.data_dir.join(&self.desires_file)
    }

    pub fn memories_path(&self) -> PathBuf {
        self.data_dir.join(&self.memories_file)
    }

    pub fn persona_path(&self) -> PathBuf {
        self.data_dir.join(&self.persona_file)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Short-term buffer bound (W): over this, the tail is offered to
    /// compaction.
    pub max_turns: usize,
    /// Turns kept verbatim after compaction; everything older is eligible.
    pub compaction_watermark: usize,
    /// Minimum importance for an exchange to become a long-term record.
    pub importance_threshold: f32,
    /// Long-term capacity (M).
    pub capacity: usize,
    /// Per-day multiplicative importance decay.
    pub decay_factor: f64,
    /// Decayed importance never drops below this — old but once-critical
    /// records keep a residual rank.
    pub importance_floor: f32,
    /// Records returned by retrieval.
    pub retrieve_k: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_turns: 24,
            compaction_watermark: 12,
            importance_threshold: 0.55,
            capacity: 100,
            decay_factor: 0.98,
            importance_floor: 0.1,
            retrieve_k: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    pub enabled: bool,
    pub voice_id: Option<String>,
    pub model_id: String,
    pub output_format: String,
    pub timeout_secs: f64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            voice_id: None,
            model_id: "eleven_multilingual_v2".to_string(),
            output_format: "mp3_44100_128".to_string(),
            timeout_secs: 30.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
    /// Sessions kept in the in-memory store before the oldest are pruned.
    pub max_sessions: usize,
    /// Autonomous events kept for the polling endpoint.
    pub max_events: usize,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_sessions: 64,
            max_events: 100,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = KokoroConfig::default();
        assert_eq!(cfg.llm.max_tokens, 4096);
        assert_eq!(cfg.memory.capacity, 100);
        assert_eq!(cfg.agent.min_tick_interval_secs, 3.0);
        assert!(cfg.tts.enabled);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
[llm]
model = "claude-haiku-4-5-20251001"
"#;
        let cfg: KokoroConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.llm.model, "claude-haiku-4-5-20251001");
        // Defaults for unspecified fields
        assert_eq!(cfg.llm.max_tokens, 4096);
        assert_eq!(cfg.memory.max_turns, 24);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[llm]
model = "claude-sonnet-4-20250514"
max_tokens = 2048
temperature = 0.9

[agent]
data_dir = "state"
content_threshold = 0.85
min_tick_interval_secs = 10.0
timezone = "Europe/Berlin"

[memory]
max_turns = 40
compaction_watermark = 20
capacity = 250

[tts]
enabled = false

[web]
host = "127.0.0.1"
port = 9001
"#;
        let cfg: KokoroConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.llm.max_tokens, 2048);
        assert_eq!(cfg.agent.timezone, "Europe/Berlin");
        assert_eq!(cfg.agent.desires_path(), PathBuf::from("state/desires.json"));
        assert_eq!(cfg.memory.capacity, 250);
        assert!(!cfg.tts.enabled);
        assert_eq!(cfg.web.port, 9001);
    }

    #[test]
    fn test_load_or_default_on_missing_file() {
        let cfg = KokoroConfig::load_or_default("/nonexistent/kokoro.toml");
        assert_eq!(cfg.memory.retrieve_k, 5);
    }
}
