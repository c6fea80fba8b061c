pub mod api_types;
pub mod capability;
pub mod llm;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod retry;

pub use capability::{CapabilityDescriptor, CapabilityRegistry, NullToolHost, ToolHost};
pub use llm::{CompletionParams, LlmClient};
pub use orchestrator::{
    AgentSnapshot, Orchestrator, ReplyOutcome, TickOutcome, TickPhase, TickRequest, TickTrigger,
};
pub use providers::anthropic::AnthropicClient;
pub use providers::mock::MockLlm;
