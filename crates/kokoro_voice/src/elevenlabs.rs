//! ElevenLabs text-to-speech provider.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use crate::tts::{SynthesizedAudio, TextToSpeech};

pub struct ElevenLabsTts {
    client: Client,
    api_key: String,
    default_voice_id: String,
    model_id: String,
    output_format: String,
}

impl ElevenLabsTts {
    pub fn new(
        api_key: impl Into<String>,
        default_voice_id: impl Into<String>,
        model_id: impl Into<String>,
        output_format: impl Into<String>,
        timeout_secs: f64,
    ) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs_f64(timeout_secs))
                .build()?,
            api_key: api_key.into(),
            default_voice_id: default_voice_id.into(),
            model_id: model_id.into(),
            output_format: output_format.into(),
        })
    }
}

#[async_trait]
impl TextToSpeech for ElevenLabsTts {
    async fn synthesize(&self, text: &str, voice_id: Option<&str>) -> Result<SynthesizedAudio> {
        if text.trim().is_empty() {
            anyhow::bail!("text for TTS must not be empty");
        }
        let voice = voice_id.unwrap_or(&self.default_voice_id);
        if voice.is_empty() {
            anyhow::bail!("ElevenLabs voice_id is not configured");
        }

        let url = format!("https://api.elevenlabs.io/v1/text-to-speech/{}", voice);
        let body = serde_json::json!({
            "text": text,
            "model_id": self.model_id,
            "output_format": self.output_format,
        });

        tracing::debug!(voice = %voice, chars = text.len(), "synthesizing speech");
        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .header("accept", "audio/mpeg")
            .json(&body)
            .send()
            .await
            .context("Failed to reach ElevenLabs")?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("ElevenLabs error {}: {}", status, detail);
        }

        Ok(SynthesizedAudio {
            bytes: response.bytes().await?.to_vec(),
            mime_type: "audio/mpeg".to_string(),
        })
    }

    fn voice_id(&self) -> &str {
        &self.default_voice_id
    }

    fn provider_name(&self) -> &'static str {
        "elevenlabs"
    }
}
