//! The autonomous-tick state machine.
//!
//! One tick runs `IDLE → SELECTING → AWAITING_ACTION → INTEGRATING → IDLE`,
//! with a `CAMERA_REQUESTED` side branch when the chosen desire needs
//! caller-side sensory input that isn't attached yet.
//!
//! Mutation discipline: the desire catalog and the memory store are cloned at
//! SELECTING, all work happens on the snapshots, and the snapshots are
//! committed (after the documents are durably written) only in INTEGRATING —
//! strictly after a successful collaborator reply. An LLM failure, a tool
//! failure, a camera request, or a cancelled call therefore leaves the shared
//! state byte-for-byte unchanged.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use chrono_tz::Tz;
use tokio::sync::Mutex;

use kokoro_core::store::save_document;
use kokoro_core::{
    AttachmentRef, CollaboratorKind, ConversationState, CoreError, DesireStore, Exchange,
    KokoroConfig, PersonaConfig, Summarizer, Turn,
};
use kokoro_memory::{ContextCompactor, MemoryStore};

use crate::api_types::{message_from_turn, Message};
use crate::capability::CapabilityRegistry;
use crate::llm::{CompletionParams, LlmClient};
use crate::prompts;

/// Where the state machine currently sits. Observable between ticks; the
/// persona-wide lock makes mid-tick phases invisible to other callers,
/// except `CameraRequested`, which deliberately persists until the next
/// invocation arrives with the requested input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPhase {
    Idle,
    Selecting,
    AwaitingAction,
    CameraRequested,
    Integrating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickTrigger {
    UserMessage,
    Autonomous,
}

/// One invocation of the state machine.
#[derive(Debug, Clone)]
pub struct TickRequest {
    pub trigger: TickTrigger,
    pub session_id: String,
    pub message: Option<String>,
    pub attachment: Option<AttachmentRef>,
    pub conversation: ConversationState,
    /// Skip the autonomous rate-limit guard (operator override).
    pub force: bool,
}

impl TickRequest {
    pub fn user(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            trigger: TickTrigger::UserMessage,
            session_id: session_id.into(),
            message: Some(message.into()),
            attachment: None,
            conversation: ConversationState::default(),
            force: false,
        }
    }

    pub fn autonomous(session_id: impl Into<String>) -> Self {
        Self {
            trigger: TickTrigger::Autonomous,
            session_id: session_id.into(),
            message: None,
            attachment: None,
            conversation: ConversationState::default(),
            force: false,
        }
    }

    pub fn with_conversation(mut self, conversation: ConversationState) -> Self {
        self.conversation = conversation;
        self
    }

    pub fn with_attachment(mut self, attachment: AttachmentRef) -> Self {
        self.attachment = Some(attachment);
        self
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

/// A completed exchange.
#[derive(Debug, Clone)]
pub struct ReplyOutcome {
    pub reply: String,
    /// Updated conversation state for the caller to persist.
    pub conversation: ConversationState,
    /// Desire satisfied by this tick, if any.
    pub served_desire: Option<String>,
    /// Whether the exchange produced a long-term memory.
    pub memory_created: bool,
}

#[derive(Debug, Clone)]
pub enum TickOutcome {
    Reply(ReplyOutcome),
    /// The selected desire needs caller-side sensory input. Nothing was
    /// committed; the next invocation should attach the requested frame.
    CameraRequested {
        desire_id: String,
        capability: String,
    },
}

/// Read-only view for health endpoints and the CLI banner.
#[derive(Debug, Clone)]
pub struct AgentSnapshot {
    pub desire_count: usize,
    pub memory_count: usize,
    pub phase: TickPhase,
    pub active_desire: Option<String>,
}

struct AgentState {
    desires: DesireStore,
    memory: MemoryStore,
    phase: TickPhase,
    last_autonomous_tick: Option<Instant>,
}

/// The persona-wide singleton service: desire catalog, memory store, and the
/// mutual-exclusion guard serializing every read-modify-write against them.
/// Constructed once at process start and passed by reference — never looked
/// up ambiently.
pub struct Orchestrator {
    persona: Arc<PersonaConfig>,
    llm: Arc<dyn LlmClient>,
    compactor: ContextCompactor,
    capabilities: CapabilityRegistry,
    desires_path: PathBuf,
    memories_path: PathBuf,
    params: CompletionParams,
    satisfy_amount: f32,
    min_tick_interval: Duration,
    timezone: Tz,
    state: Mutex<AgentState>,
}

impl Orchestrator {
    pub fn new(
        config: &KokoroConfig,
        persona: Arc<PersonaConfig>,
        desires: DesireStore,
        memory: MemoryStore,
        llm: Arc<dyn LlmClient>,
        summarizer: Arc<dyn Summarizer>,
        capabilities: CapabilityRegistry,
    ) -> Self {
        let compactor = ContextCompactor::new(summarizer, memory.compaction_policy());
        Self {
            persona,
            llm,
            compactor,
            capabilities,
            desires_path: config.agent.desires_path(),
            memories_path: config.agent.memories_path(),
            params: CompletionParams {
                max_tokens: config.llm.max_tokens,
                temperature: config.llm.temperature,
            },
            satisfy_amount: config.agent.satisfy_amount,
            min_tick_interval: Duration::from_secs_f64(config.agent.min_tick_interval_secs),
            timezone: prompts::resolve_timezone(&config.agent.timezone),
            state: Mutex::new(AgentState {
                desires,
                memory,
                phase: TickPhase::Idle,
                last_autonomous_tick: None,
            }),
        }
    }

    /// Handle a direct user message. Never rate-limited, never enters the
    /// camera branch.
    pub async fn handle_message(&self, request: TickRequest) -> Result<ReplyOutcome, CoreError> {
        debug_assert_eq!(request.trigger, TickTrigger::UserMessage);
        match self.run_tick(request).await? {
            TickOutcome::Reply(outcome) => Ok(outcome),
            TickOutcome::CameraRequested { .. } => {
                unreachable!("user-triggered ticks never request the camera")
            }
        }
    }

    /// Run one autonomous tick. Rejected with `RateLimited` — and zero state
    /// mutation — when it arrives before the minimum interval since the
    /// previous completed tick.
    pub async fn autonomous_tick(&self, request: TickRequest) -> Result<TickOutcome, CoreError> {
        debug_assert_eq!(request.trigger, TickTrigger::Autonomous);
        self.run_tick(request).await
    }

    pub async fn snapshot(&self) -> AgentSnapshot {
        let state = self.state.lock().await;
        AgentSnapshot {
            desire_count: state.desires.len(),
            memory_count: state.memory.len(),
            phase: state.phase,
            active_desire: state.desires.select_active().map(|d| d.id.clone()),
        }
    }

    async fn run_tick(&self, request: TickRequest) -> Result<TickOutcome, CoreError> {
        let mut state = self.state.lock().await;

        // Pure guard, checked before anything is touched.
        if request.trigger == TickTrigger::Autonomous && !request.force {
            if let Some(last) = state.last_autonomous_tick {
                let elapsed = last.elapsed();
                if elapsed < self.min_tick_interval {
                    return Err(CoreError::RateLimited {
                        wait_secs: (self.min_tick_interval - elapsed).as_secs_f64(),
                    });
                }
            }
        }

        // --- SELECTING ---------------------------------------------------
        state.phase = TickPhase::Selecting;
        let now_utc = Utc::now();
        let now = now_utc.timestamp();

        let mut desires = state.desires.clone();
        desires.tick(now);
        let selected = desires.select_active().cloned();
        if let Some(d) = &selected {
            tracing::debug!(desire = %d.id, priority = d.priority(), "desire selected");
        }

        // Camera branch: the chosen desire needs input only the caller can
        // capture. End the tick here, committing nothing.
        if request.trigger == TickTrigger::Autonomous {
            if let Some(desire) = &selected {
                if let Some(cap) = self.capabilities.first_supported(&desire.capabilities) {
                    if cap.requires_attachment && request.attachment.is_none() {
                        state.phase = TickPhase::CameraRequested;
                        tracing::info!(
                            desire = %desire.id,
                            capability = %cap.id,
                            "sensory input requested, tick ends uncommitted"
                        );
                        return Ok(TickOutcome::CameraRequested {
                            desire_id: desire.id.clone(),
                            capability: cap.id.clone(),
                        });
                    }
                }
            }
        }

        // Compaction runs before prompt building. A failure skips it — the
        // buffer stays untouched and the next tick retries.
        let mut conversation = request.conversation.clone();
        match self.compactor.compact(&conversation).await {
            Ok(Some(outcome)) => ContextCompactor::apply(&mut conversation, &outcome),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("compaction failed, will retry next tick: {}", e);
            }
        }

        // --- AWAITING_ACTION ----------------------------------------------
        state.phase = TickPhase::AwaitingAction;

        let mut capability_notes = Vec::new();
        let (turn_text, recall_query) = match request.trigger {
            TickTrigger::UserMessage => {
                let text = request.message.clone().unwrap_or_default();
                (text.clone(), text)
            }
            TickTrigger::Autonomous => {
                let mut text = prompts::autonomous_notice(now_utc, self.timezone);
                let query = match &selected {
                    Some(desire) => {
                        let voice = desires.pick_prompt(&desire.id).unwrap_or_default();
                        text.push('\n');
                        text.push_str(&prompts::inner_voice(&desire.label, &voice));

                        // Host-invokable capability: typed dispatch, result
                        // injected into the action request.
                        if let Some(cap) = self.capabilities.first_supported(&desire.capabilities)
                        {
                            if !cap.requires_attachment {
                                let result = match self
                                    .capabilities
                                    .invoke(&cap.id, serde_json::json!({}))
                                    .await
                                {
                                    Ok(result) => result,
                                    Err(e) => {
                                        state.phase = TickPhase::Idle;
                                        return Err(e);
                                    }
                                };
                                capability_notes.push(prompts::capability_note(&cap.id, &result));
                            }
                        }
                        desire.label.clone()
                    }
                    None => "recent conversation".to_string(),
                };
                (text, query)
            }
        };

        let mut user_turn = Turn::user(turn_text);
        user_turn.attachment = request.attachment.clone();
        conversation.push(user_turn);

        let memory_context = state.memory.recall_context(&recall_query, now);
        let system = prompts::system_context(
            &self.persona,
            &conversation.compressed_context,
            &memory_context,
            &capability_notes,
        );
        let history: Vec<Message> = conversation.turns.iter().map(message_from_turn).collect();

        let reply = match self.llm.respond(&system, history, self.params.clone()).await {
            Ok(reply) => reply,
            Err(e) => {
                state.phase = TickPhase::Idle;
                return Err(CoreError::collaborator(CollaboratorKind::Llm, e));
            }
        };

        // --- INTEGRATING --------------------------------------------------
        state.phase = TickPhase::Integrating;
        conversation.push(Turn::assistant(reply.clone()));

        let mut memory = state.memory.clone();
        let exchange = Exchange {
            user_text: request.message.clone().unwrap_or_else(|| {
                selected
                    .as_ref()
                    .map(|d| d.label.clone())
                    .unwrap_or_default()
            }),
            assistant_text: reply.clone(),
            session: Some(request.session_id.clone()),
        };
        let memory_created = memory.extract(&exchange, now).is_some();

        let served_desire = match (&request.trigger, &selected) {
            (TickTrigger::Autonomous, Some(desire)) if !reply.trim().is_empty() => {
                desires.satisfy(&desire.id, self.satisfy_amount, now)?;
                Some(desire.id.clone())
            }
            _ => None,
        };

        // Persist first, commit the snapshots second: a failed write surfaces
        // as a failed tick with the shared state unchanged.
        if let Err(e) = save_document(&self.desires_path, &desires.to_document(now)) {
            state.phase = TickPhase::Idle;
            return Err(e);
        }
        if let Err(e) = save_document(&self.memories_path, &memory.to_document(now)) {
            state.phase = TickPhase::Idle;
            return Err(e);
        }

        state.desires = desires;
        state.memory = memory;
        if request.trigger == TickTrigger::Autonomous {
            state.last_autonomous_tick = Some(Instant::now());
        }
        state.phase = TickPhase::Idle;

        Ok(TickOutcome::Reply(ReplyOutcome {
            reply,
            conversation,
            served_desire,
            memory_created,
        }))
    }
}
