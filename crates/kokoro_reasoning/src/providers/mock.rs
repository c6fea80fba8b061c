//! Scripted LLM used by tests and offline runs.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::api_types::Message;
use crate::llm::{CompletionParams, LlmClient};

/// One recorded call: the system context and a flattened history transcript.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system: String,
    pub history_len: usize,
}

#[derive(Default)]
struct MockState {
    replies: VecDeque<String>,
    calls: Vec<RecordedCall>,
    fail: bool,
}

/// Deterministic in-memory LLM: queued replies, optional failure mode, and
/// call recording for assertions.
#[derive(Default)]
pub struct MockLlm {
    state: Mutex<MockState>,
}

impl MockLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mock = Self::new();
        {
            let mut state = mock.state.lock().unwrap();
            state.replies = replies.into_iter().map(Into::into).collect();
        }
        mock
    }

    /// Make every subsequent call fail.
    pub fn fail_next(&self) {
        self.state.lock().unwrap().fail = true;
    }

    pub fn recover(&self) {
        self.state.lock().unwrap().fail = false;
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().unwrap().calls.clone()
    }

    fn next_reply(&self, system: &str, history: &[Message]) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(RecordedCall {
            system: system.to_string(),
            history_len: history.len(),
        });
        if state.fail {
            anyhow::bail!("mock llm failure");
        }
        Ok(state
            .replies
            .pop_front()
            .unwrap_or_else(|| "(mock reply)".to_string()))
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn respond(
        &self,
        system: &str,
        history: Vec<Message>,
        _params: CompletionParams,
    ) -> Result<String> {
        self.next_reply(system, &history)
    }
}

#[async_trait]
impl kokoro_core::Summarizer for MockLlm {
    async fn summarize(&self, tail: &str, _prior_summary: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        if state.fail {
            anyhow::bail!("mock summarizer failure");
        }
        Ok(format!("(summary of {} chars)", tail.len()))
    }
}
