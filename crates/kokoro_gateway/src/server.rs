//! The HTTP gateway: chat, autonomous ticks, speech, and health.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use serde::Deserialize;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

use kokoro_core::{AttachmentRef, ConversationState, CoreError};
use kokoro_reasoning::{Orchestrator, TickOutcome, TickRequest};
use kokoro_voice::TextToSpeech;

use crate::session::{normalize_session_id, sanitize_state, SessionStore};
use crate::types::{
    AutonomousTickRequest, AutonomousTickResponse, CameraRequest, ChatRequest, ChatResponse,
    EventsResponse, SpeakRequest, SpeakResponse, TickEvent,
};

struct EventLog {
    next_id: u64,
    events: Vec<TickEvent>,
    cap: usize,
}

impl EventLog {
    fn push(&mut self, reply: String, served_desire: Option<String>) -> TickEvent {
        let event = TickEvent {
            id: self.next_id,
            created_at: chrono::Utc::now().to_rfc3339(),
            reply,
            served_desire,
        };
        self.next_id += 1;
        self.events.push(event.clone());
        if self.events.len() > self.cap {
            let drop = self.events.len() - self.cap;
            self.events.drain(..drop);
        }
        event
    }
}

/// Shared state behind every route.
#[derive(Clone)]
pub struct GatewayState {
    orchestrator: Arc<Orchestrator>,
    sessions: Arc<dyn SessionStore>,
    tts: Option<Arc<dyn TextToSpeech>>,
    events: Arc<RwLock<EventLog>>,
}

impl GatewayState {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        sessions: Arc<dyn SessionStore>,
        tts: Option<Arc<dyn TextToSpeech>>,
        max_events: usize,
    ) -> Self {
        Self {
            orchestrator,
            sessions,
            tts,
            events: Arc::new(RwLock::new(EventLog {
                next_id: 1,
                events: Vec::new(),
                cap: max_events.max(1),
            })),
        }
    }
}

/// The gateway HTTP server.
pub struct GatewayServer {
    state: GatewayState,
    host: String,
    port: u16,
}

impl GatewayServer {
    pub fn new(state: GatewayState, host: &str, port: u16) -> Self {
        Self {
            state,
            host: host.to_string(),
            port,
        }
    }

    pub fn router(state: GatewayState) -> Router {
        Router::new()
            .route("/api/health", get(health))
            .route("/api/chat", post(chat))
            .route("/api/autonomous/tick", post(autonomous_tick))
            .route("/api/autonomous/events", get(autonomous_events))
            .route("/api/speak", post(speak))
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Bind and serve until the process exits.
    pub async fn serve(self) -> anyhow::Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!("gateway listening on {}", addr);
        axum::serve(listener, Self::router(self.state)).await?;
        Ok(())
    }
}

fn status_for(err: &CoreError) -> StatusCode {
    match err {
        CoreError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        CoreError::Collaborator { .. } => StatusCode::BAD_GATEWAY,
        CoreError::Config(_) | CoreError::Persistence { .. } | CoreError::NotFound { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Strip a data-URL prefix and validate the base64 payload.
fn parse_attachment(
    image_base64: &str,
    media_type: Option<&str>,
) -> Result<AttachmentRef, (StatusCode, String)> {
    let data = match image_base64.split_once(',') {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => image_base64,
    };
    base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("invalid image data: {}", e)))?;
    Ok(AttachmentRef {
        media_type: media_type.unwrap_or("image/jpeg").to_string(),
        data_base64: data.to_string(),
    })
}

/// Resolve conversation state: client-held payload wins, then the session
/// store, then a fresh state.
async fn resolve_state(
    state: &GatewayState,
    session_id: &str,
    payload: Option<ConversationState>,
) -> ConversationState {
    if let Some(payload_state) = payload {
        return sanitize_state(payload_state);
    }
    state.sessions.get(session_id).await.unwrap_or_default()
}

async fn synthesize(
    state: &GatewayState,
    text: &str,
    voice_id: Option<&str>,
) -> (Option<String>, Option<String>, Option<String>) {
    let tts = match &state.tts {
        Some(tts) => tts,
        None => {
            return (
                None,
                None,
                Some("TTS is not configured. Set ELEVENLABS_API_KEY and a voice id.".to_string()),
            )
        }
    };
    match tts.synthesize(text, voice_id).await {
        Ok(audio) => (
            Some(base64::engine::general_purpose::STANDARD.encode(&audio.bytes)),
            Some(audio.mime_type),
            None,
        ),
        Err(e) => {
            tracing::warn!("speech synthesis failed: {}", e);
            (None, None, Some(e.to_string()))
        }
    }
}

// ============================================================================
// Route handlers
// ============================================================================

async fn health(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    let snapshot = state.orchestrator.snapshot().await;
    Json(serde_json::json!({
        "status": "ok",
        "desires": snapshot.desire_count,
        "memories": snapshot.memory_count,
        "phase": format!("{:?}", snapshot.phase),
        "active_desire": snapshot.active_desire,
        "tts_enabled": state.tts.is_some(),
    }))
}

async fn chat(
    State(state): State<GatewayState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    if payload.message.trim().is_empty() && payload.image_base64.is_none() {
        return Err((
            StatusCode::BAD_REQUEST,
            "message or image is required".to_string(),
        ));
    }

    let attachment = match &payload.image_base64 {
        Some(image) => Some(parse_attachment(image, payload.image_media_type.as_deref())?),
        None => None,
    };

    let session_id = normalize_session_id(payload.session_id.as_deref());
    let conversation = resolve_state(&state, &session_id, payload.conversation_state).await;

    let mut request =
        TickRequest::user(&session_id, &payload.message).with_conversation(conversation);
    if let Some(attachment) = attachment {
        request = request.with_attachment(attachment);
    }

    let outcome = state
        .orchestrator
        .handle_message(request)
        .await
        .map_err(|e| (status_for(&e), e.to_string()))?;

    state
        .sessions
        .put(&session_id, outcome.conversation.clone())
        .await;
    let client_state = sanitize_state(outcome.conversation);

    if !payload.speak {
        return Ok(Json(ChatResponse {
            reply: outcome.reply,
            audio_base64: None,
            audio_mime_type: None,
            tts_error: None,
            conversation_state: client_state,
        }));
    }

    let (audio_base64, audio_mime_type, tts_error) =
        synthesize(&state, &outcome.reply, payload.voice_id.as_deref()).await;
    Ok(Json(ChatResponse {
        reply: outcome.reply,
        audio_base64,
        audio_mime_type,
        tts_error,
        conversation_state: client_state,
    }))
}

async fn autonomous_tick(
    State(state): State<GatewayState>,
    Json(payload): Json<AutonomousTickRequest>,
) -> Result<Json<AutonomousTickResponse>, (StatusCode, String)> {
    let attachment = match &payload.image_base64 {
        Some(image) => Some(parse_attachment(image, payload.image_media_type.as_deref())?),
        None => None,
    };

    let session_id = normalize_session_id(payload.session_id.as_deref());
    let conversation = resolve_state(&state, &session_id, payload.conversation_state).await;

    let mut request = TickRequest::autonomous(&session_id).with_conversation(conversation);
    if let Some(attachment) = attachment {
        request = request.with_attachment(attachment);
    }
    if payload.force {
        request = request.forced();
    }

    let outcome = state
        .orchestrator
        .autonomous_tick(request)
        .await
        .map_err(|e| (status_for(&e), e.to_string()))?;

    match outcome {
        TickOutcome::CameraRequested {
            desire_id,
            capability,
        } => {
            // Nothing was committed; the client should retry with a frame.
            let id = state.events.read().await.next_id;
            Ok(Json(AutonomousTickResponse {
                id,
                created_at: chrono::Utc::now().to_rfc3339(),
                reply: String::new(),
                served_desire: None,
                camera_request: Some(CameraRequest {
                    desire_id,
                    capability,
                }),
                audio_base64: None,
                audio_mime_type: None,
                tts_error: None,
                conversation_state: None,
            }))
        }
        TickOutcome::Reply(reply) => {
            state
                .sessions
                .put(&session_id, reply.conversation.clone())
                .await;
            let client_state = sanitize_state(reply.conversation);

            let event = state
                .events
                .write()
                .await
                .push(reply.reply.clone(), reply.served_desire.clone());

            let (audio_base64, audio_mime_type, tts_error) = if payload.speak {
                synthesize(&state, &reply.reply, payload.voice_id.as_deref()).await
            } else {
                (None, None, None)
            };

            Ok(Json(AutonomousTickResponse {
                id: event.id,
                created_at: event.created_at,
                reply: reply.reply,
                served_desire: reply.served_desire,
                camera_request: None,
                audio_base64,
                audio_mime_type,
                tts_error,
                conversation_state: Some(client_state),
            }))
        }
    }
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    #[serde(default)]
    after_id: u64,
}

async fn autonomous_events(
    State(state): State<GatewayState>,
    Query(query): Query<EventsQuery>,
) -> Json<EventsResponse> {
    let log = state.events.read().await;
    let events: Vec<TickEvent> = log
        .events
        .iter()
        .filter(|e| e.id > query.after_id)
        .cloned()
        .collect();
    let latest_id = log.events.last().map(|e| e.id).unwrap_or(query.after_id);
    Json(EventsResponse { events, latest_id })
}

async fn speak(
    State(state): State<GatewayState>,
    Json(payload): Json<SpeakRequest>,
) -> Result<Json<SpeakResponse>, (StatusCode, String)> {
    if payload.text.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "text is required".to_string()));
    }
    let tts = state.tts.as_ref().ok_or((
        StatusCode::SERVICE_UNAVAILABLE,
        "TTS is not configured".to_string(),
    ))?;

    let audio = tts
        .synthesize(&payload.text, payload.voice_id.as_deref())
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))?;

    Ok(Json(SpeakResponse {
        audio_base64: base64::engine::general_purpose::STANDARD.encode(&audio.bytes),
        audio_mime_type: audio.mime_type,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attachment_strips_data_url() {
        let att = parse_attachment("data:image/png;base64,aGVsbG8=", Some("image/png")).unwrap();
        assert_eq!(att.media_type, "image/png");
        assert_eq!(att.data_base64, "aGVsbG8=");
    }

    #[test]
    fn test_parse_attachment_rejects_garbage() {
        let err = parse_attachment("!!not-base64!!", None).unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&CoreError::RateLimited { wait_secs: 1.0 }),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_for(&CoreError::collaborator(
                kokoro_core::CollaboratorKind::Llm,
                "down"
            )),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&CoreError::Config("bad".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_event_log_caps_history() {
        let mut log = EventLog {
            next_id: 1,
            events: Vec::new(),
            cap: 3,
        };
        for i in 0..5 {
            log.push(format!("reply {}", i), None);
        }
        assert_eq!(log.events.len(), 3);
        assert_eq!(log.events.first().unwrap().id, 3);
        assert_eq!(log.next_id, 6);
    }
}
