use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::env;

use crate::api_types::{Message, MessagesRequest, MessagesResponse, Role};
use crate::llm::{CompletionParams, LlmClient};
use crate::retry::{with_retry, RetryConfig};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API client.
///
/// With `ANTHROPIC_API_KEY=mock` (or unset) every call returns a canned
/// reply after a short delay, so the rest of the system can run offline.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    model: String,
}

impl AnthropicClient {
    pub fn new(model: &str) -> Result<Self> {
        let api_key = env::var("ANTHROPIC_API_KEY").unwrap_or_else(|_| "mock".to_string());
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()?,
            api_key,
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint() -> String {
        let base = env::var("ANTHROPIC_BASE_URL")
            .unwrap_or_else(|_| "https://api.anthropic.com".to_string());
        format!("{}/v1/messages", base.trim_end_matches('/'))
    }

    async fn complete(
        &self,
        system: Option<String>,
        messages: Vec<Message>,
        params: CompletionParams,
    ) -> Result<MessagesResponse> {
        if self.api_key == "mock" {
            tokio::time::sleep(std::time::Duration::from_millis(300)).await;
            return Ok(MessagesResponse {
                content: vec![crate::api_types::ResponseBlock {
                    kind: "text".to_string(),
                    text: "(mock reply) I hear you.".to_string(),
                }],
                stop_reason: Some("end_turn".to_string()),
            });
        }

        let url = Self::endpoint();
        let body = MessagesRequest {
            model: self.model.clone(),
            system,
            messages,
            max_tokens: params.max_tokens,
            temperature: Some(params.temperature),
        };

        tracing::debug!(
            model = %self.model,
            max_tokens = params.max_tokens,
            "calling Anthropic messages API"
        );

        let retry = RetryConfig::default();
        let client = &self.client;
        let api_key = &self.api_key;
        let response = with_retry(&retry, "Anthropic", || async {
            let resp = client
                .post(&url)
                .header("x-api-key", api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body)
                .send()
                .await
                .context("Failed to send request to Anthropic")?;
            Ok(resp)
        })
        .await?;

        let text = response.text().await?;
        let parsed: MessagesResponse =
            serde_json::from_str(&text).context("Failed to parse Anthropic response")?;
        Ok(parsed)
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    #[tracing::instrument(skip(self, system, history, params), fields(model = %self.model))]
    async fn respond(
        &self,
        system: &str,
        history: Vec<Message>,
        params: CompletionParams,
    ) -> Result<String> {
        let system = (!system.is_empty()).then(|| system.to_string());
        let response = self.complete(system, history, params).await?;
        let reply = response.text();
        if reply.trim().is_empty() {
            anyhow::bail!(
                "Anthropic returned no text (stop_reason: {:?})",
                response.stop_reason
            );
        }
        Ok(reply)
    }
}

#[async_trait]
impl kokoro_core::Summarizer for AnthropicClient {
    async fn summarize(&self, tail: &str, prior_summary: &str) -> Result<String> {
        let mut prompt = String::from(
            "Summarize the following conversation concisely. Keep only the important points.\n\n",
        );
        if !prior_summary.is_empty() {
            prompt.push_str(&format!("Earlier summary:\n{}\n\n", prior_summary));
        }
        prompt.push_str(&format!("Conversation:\n{}\n\nSummary (3-5 sentences):", tail));

        let messages = vec![Message {
            role: Role::User,
            content: vec![crate::api_types::ContentBlock::Text { text: prompt }],
        }];
        let params = CompletionParams {
            max_tokens: 500,
            temperature: 0.3,
        };
        let response = self.complete(None, messages, params).await?;
        let summary = response.text();
        if summary.trim().is_empty() {
            anyhow::bail!("summarization produced no text");
        }
        Ok(summary)
    }
}
