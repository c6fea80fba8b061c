use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use kokoro_core::desire::{default_catalog, DesireDocument, DesireStore};
use kokoro_core::persona::PersonaDocument;
use kokoro_core::store::load_or_seed;
use kokoro_core::{ConversationState, CoreError, KokoroConfig, PersonaConfig};
use kokoro_gateway::{GatewayServer, GatewayState, InMemorySessionStore};
use kokoro_memory::{MemoryDocument, MemoryStore};
use kokoro_reasoning::{
    AnthropicClient, CapabilityRegistry, Orchestrator, TickOutcome, TickRequest,
};
use kokoro_voice::{ElevenLabsTts, TextToSpeech};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to kokoro.toml (defaults to ./kokoro.toml, then the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Let the persona act on its own between messages
    #[arg(short, long)]
    autonomous: bool,

    /// Run the HTTP gateway instead of the interactive prompt
    #[arg(long)]
    serve: bool,

    /// Gateway bind host (with --serve)
    #[arg(long)]
    host: Option<String>,

    /// Gateway bind port (with --serve)
    #[arg(long)]
    port: Option<u16>,
}

fn config_path(args: &Args) -> PathBuf {
    if let Some(path) = &args.config {
        return path.clone();
    }
    let cwd_candidate = PathBuf::from("kokoro.toml");
    if cwd_candidate.exists() {
        return cwd_candidate;
    }
    dirs::config_dir()
        .map(|d| d.join("kokoro/kokoro.toml"))
        .unwrap_or(cwd_candidate)
}

/// Load (or seed) the three state documents and build the orchestrator.
fn build_orchestrator(config: &KokoroConfig) -> Result<(Arc<Orchestrator>, Arc<PersonaConfig>)> {
    let now = chrono::Utc::now().timestamp();

    let persona_doc = load_or_seed(&config.agent.persona_path(), || {
        PersonaDocument::new(PersonaConfig::default())
    })?;
    let persona = Arc::new(persona_doc.persona);

    let desire_doc = load_or_seed(&config.agent.desires_path(), || DesireDocument {
        schema_version: DesireDocument::SCHEMA_VERSION,
        updated_at: now,
        last_decayed_at: now,
        desires: default_catalog(now),
    })?;
    let desires = DesireStore::from_document(desire_doc, config.agent.content_threshold);

    let memory_doc = load_or_seed(&config.agent.memories_path(), || MemoryDocument::empty(now))?;
    let memory = MemoryStore::from_document(memory_doc, config.memory.clone(), &persona);

    let llm = Arc::new(AnthropicClient::new(&config.llm.model)?);

    // No tool collaborator is wired in by default; desires fall back to
    // conversation-only actions. Deployments with sensors register a real
    // ToolHost here.
    let capabilities = CapabilityRegistry::empty();

    let orchestrator = Arc::new(Orchestrator::new(
        config,
        persona.clone(),
        desires,
        memory,
        llm.clone(),
        llm,
        capabilities,
    ));
    Ok((orchestrator, persona))
}

fn build_tts(config: &KokoroConfig) -> Option<Arc<dyn TextToSpeech>> {
    if !config.tts.enabled {
        return None;
    }
    let api_key = std::env::var("ELEVENLABS_API_KEY").ok()?;
    let voice_id = config.tts.voice_id.clone()?;
    match ElevenLabsTts::new(
        api_key,
        voice_id,
        config.tts.model_id.clone(),
        config.tts.output_format.clone(),
        config.tts.timeout_secs,
    ) {
        Ok(tts) => Some(Arc::new(tts)),
        Err(e) => {
            warn!("TTS disabled, client construction failed: {}", e);
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let config = KokoroConfig::load_or_default(config_path(&args));

    // A fatal ConfigError here means a malformed state document; don't start.
    let (orchestrator, persona) = match build_orchestrator(&config) {
        Ok(built) => built,
        Err(e) => {
            error!("failed to start: {}", e);
            std::process::exit(1);
        }
    };

    if args.serve {
        let host = args.host.unwrap_or_else(|| config.web.host.clone());
        let port = args.port.unwrap_or(config.web.port);
        let sessions = Arc::new(InMemorySessionStore::new(config.web.max_sessions));
        let state = GatewayState::new(
            orchestrator,
            sessions,
            build_tts(&config),
            config.web.max_events,
        );
        info!("starting gateway for persona '{}'", persona.identity.name);
        return GatewayServer::new(state, &host, port).serve().await;
    }

    run_repl(orchestrator, persona, &config, args.autonomous).await
}

async fn run_repl(
    orchestrator: Arc<Orchestrator>,
    persona: Arc<PersonaConfig>,
    config: &KokoroConfig,
    autonomous: bool,
) -> Result<()> {
    let snapshot = orchestrator.snapshot().await;
    println!("==================================================");
    println!("{} is awake.", persona.identity.name);
    println!(
        "Desires: {}   Memories: {}",
        snapshot.desire_count, snapshot.memory_count
    );
    if autonomous {
        println!(
            "Autonomous mode: on (every {:.0}s)",
            config.agent.autonomous_interval_secs
        );
    }
    println!("Type your message, or 'quit' to exit.");
    println!("==================================================");

    // The terminal shares one conversation between the prompt and the
    // autonomous loop, like a single ongoing chat.
    let conversation = Arc::new(Mutex::new(ConversationState::default()));

    let mut autonomous_task = None;
    if autonomous {
        let orchestrator = orchestrator.clone();
        let conversation = conversation.clone();
        let name = persona.identity.name.clone();
        let interval = std::time::Duration::from_secs_f64(config.agent.autonomous_interval_secs);
        autonomous_task = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let state = conversation.lock().await.clone();
                let request = TickRequest::autonomous("terminal").with_conversation(state);
                match orchestrator.autonomous_tick(request).await {
                    Ok(TickOutcome::Reply(reply)) => {
                        *conversation.lock().await = reply.conversation;
                        println!("\n[{}] {}\n> ", name, reply.reply);
                    }
                    Ok(TickOutcome::CameraRequested { capability, .. }) => {
                        // The terminal has no camera; the desire will be
                        // reconsidered next tick.
                        tracing::debug!("skipping tick, no source for {}", capability);
                    }
                    Err(CoreError::RateLimited { .. }) => {}
                    Err(e) => warn!("autonomous tick failed: {}", e),
                }
            }
        }));
    }

    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline("> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if matches!(trimmed, "quit" | "exit" | "q") {
                    break;
                }
                let _ = editor.add_history_entry(trimmed);

                let state = conversation.lock().await.clone();
                let request = TickRequest::user("terminal", trimmed).with_conversation(state);
                match orchestrator.handle_message(request).await {
                    Ok(outcome) => {
                        *conversation.lock().await = outcome.conversation;
                        println!("\n{}\n", outcome.reply);
                    }
                    Err(e) => {
                        println!("\n[error] {}\n", e);
                    }
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                error!("readline error: {}", e);
                break;
            }
        }
    }

    if let Some(task) = autonomous_task {
        task.abort();
    }
    println!("Goodbye!");
    Ok(())
}
