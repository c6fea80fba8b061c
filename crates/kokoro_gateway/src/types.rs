//! Request/response shapes for the web API.

use kokoro_core::ConversationState;
use serde::{Deserialize, Serialize};

/// Incoming chat payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChatRequest {
    pub message: String,
    pub image_base64: Option<String>,
    pub image_media_type: Option<String>,
    pub speak: bool,
    pub voice_id: Option<String>,
    pub session_id: Option<String>,
    /// Client-held conversation state; when present it wins over the
    /// server-side session store.
    pub conversation_state: Option<ConversationState>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts_error: Option<String>,
    pub conversation_state: ConversationState,
}

/// Optional parameters for an autonomous tick.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AutonomousTickRequest {
    pub speak: bool,
    pub voice_id: Option<String>,
    pub image_base64: Option<String>,
    pub image_media_type: Option<String>,
    pub session_id: Option<String>,
    pub conversation_state: Option<ConversationState>,
    pub force: bool,
}

impl Default for AutonomousTickRequest {
    fn default() -> Self {
        Self {
            speak: true,
            voice_id: None,
            image_base64: None,
            image_media_type: None,
            session_id: None,
            conversation_state: None,
            force: false,
        }
    }
}

/// The camera side-branch surfaced to the client: capture a frame with the
/// named capability and call the tick endpoint again with it attached.
#[derive(Debug, Clone, Serialize)]
pub struct CameraRequest {
    pub desire_id: String,
    pub capability: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AutonomousTickResponse {
    pub id: u64,
    pub created_at: String,
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub served_desire: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_request: Option<CameraRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_state: Option<ConversationState>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpeakRequest {
    pub text: String,
    #[serde(default)]
    pub voice_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpeakResponse {
    pub audio_base64: String,
    pub audio_mime_type: String,
}

/// One recorded autonomous event, kept for the polling endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct TickEvent {
    pub id: u64,
    pub created_at: String,
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub served_desire: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventsResponse {
    pub events: Vec<TickEvent>,
    pub latest_id: u64,
}
