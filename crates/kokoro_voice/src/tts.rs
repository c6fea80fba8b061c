//! Text-to-Speech trait definition

use anyhow::Result;
use async_trait::async_trait;

/// Synthesized speech: raw audio plus its MIME type.
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Text-to-Speech collaborator. Failures are non-fatal to the exchange that
/// requested speech — callers report them alongside the text reply.
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    /// Synthesize text, optionally with a per-call voice override.
    async fn synthesize(&self, text: &str, voice_id: Option<&str>) -> Result<SynthesizedAudio>;

    /// The default voice identifier in use.
    fn voice_id(&self) -> &str;

    /// Name of this TTS provider.
    fn provider_name(&self) -> &'static str;
}
