//! Wire types for the Anthropic Messages API.

use kokoro_core::{Role as TurnRole, Turn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSource {
    #[serde(rename = "type")]
    pub source_type: String,
    pub media_type: String,
    pub data: String,
}

impl ImageSource {
    pub fn base64(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            source_type: "base64".to_string(),
            media_type: media_type.into(),
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Response content block, parsed leniently: unknown block types keep their
/// tag but contribute no text.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    pub content: Vec<ResponseBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

impl MessagesResponse {
    /// Concatenate the text blocks of the reply.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter(|b| b.kind == "text")
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Convert a conversation turn into an API message. Attachments become
/// base64 image blocks after the text.
pub fn message_from_turn(turn: &Turn) -> Message {
    let role = match turn.role {
        TurnRole::User => Role::User,
        TurnRole::Assistant => Role::Assistant,
    };
    let mut content = Vec::new();
    if !turn.text.is_empty() {
        content.push(ContentBlock::Text {
            text: turn.text.clone(),
        });
    }
    if let Some(attachment) = &turn.attachment {
        content.push(ContentBlock::Image {
            source: ImageSource::base64(&attachment.media_type, &attachment.data_base64),
        });
    }
    if content.is_empty() {
        content.push(ContentBlock::Text {
            text: String::new(),
        });
    }
    Message { role, content }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kokoro_core::AttachmentRef;

    #[test]
    fn test_response_text_joins_text_blocks() {
        let json = r#"{
            "content": [
                {"type": "text", "text": "Hello"},
                {"type": "thinking", "thinking": "..."},
                {"type": "text", "text": "there"}
            ],
            "stop_reason": "end_turn"
        }"#;
        let resp: MessagesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.text(), "Hello\nthere");
    }

    #[test]
    fn test_message_from_turn_with_attachment() {
        let mut turn = Turn::user("look at this");
        turn.attachment = Some(AttachmentRef {
            media_type: "image/jpeg".to_string(),
            data_base64: "aGVsbG8=".to_string(),
        });
        let msg = message_from_turn(&turn);
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content.len(), 2);
        assert!(matches!(&msg.content[1], ContentBlock::Image { source } if source.media_type == "image/jpeg"));
    }

    #[test]
    fn test_request_serializes_tagged_blocks() {
        let req = MessagesRequest {
            model: "claude-sonnet-4-20250514".into(),
            system: Some("be yourself".into()),
            messages: vec![Message {
                role: Role::User,
                content: vec![ContentBlock::Text { text: "hi".into() }],
            }],
            max_tokens: 256,
            temperature: Some(0.7),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["messages"][0]["content"][0]["type"], "text");
    }
}
