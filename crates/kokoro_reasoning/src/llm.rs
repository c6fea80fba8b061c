use crate::api_types::Message;
use anyhow::Result;
use async_trait::async_trait;

/// Parameters for one LLM completion.
#[derive(Debug, Clone)]
pub struct CompletionParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.7,
        }
    }
}

/// The language-model collaborator.
///
/// One call per exchange: system context plus the conversation history in,
/// reply text out. Timeouts, rate limits, and malformed output all surface as
/// errors — the orchestrator treats any failure as "no state change".
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn respond(
        &self,
        system: &str,
        history: Vec<Message>,
        params: CompletionParams,
    ) -> Result<String>;
}
