//! Messages API request/response payloads.

use serde::{Deserialize, Serialize};

pub const ROLE_USER: &str = "user";

/// Media type attached to every image block, whatever the file's real format.
pub const IMAGE_MEDIA_TYPE: &str = "image/png";

/// One unit of a multimodal message.
///
/// Block types the client does not consume (tool use, thinking, ...) decode
/// as `Unsupported` so new server-side block kinds never break parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Image {
        source: ImageSource,
    },
    #[serde(other)]
    #[serde(skip_serializing)]
    Unsupported,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Image block carrying already base64-encoded data.
    pub fn png_base64(data: String) -> Self {
        Self::Image {
            source: ImageSource {
                source_type: "base64".to_string(),
                media_type: IMAGE_MEDIA_TYPE.to_string(),
                data,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSource {
    #[serde(rename = "type")]
    pub source_type: String,
    pub media_type: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: String,
    pub content: Vec<ContentBlock>,
}

/// Request body for `POST /v1/messages`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub system: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

impl MessagesRequest {
    /// Content blocks of the single user turn.
    pub fn content(&self) -> &[ContentBlock] {
        self.messages
            .first()
            .map(|m| m.content.as_slice())
            .unwrap_or_default()
    }
}

/// Completed (non-streaming) response.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl MessagesResponse {
    pub fn text(&self) -> String {
        extract_text(&self.content)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Concatenate the text of every text block, in order, with no separator.
pub fn extract_text(content: &[ContentBlock]) -> String {
    content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            ContentBlock::Image { .. } | ContentBlock::Unsupported => None,
        })
        .collect()
}

/// Payload of a `content_block_delta` stream event.
#[derive(Debug, Deserialize)]
pub(crate) struct ContentBlockDeltaEvent {
    pub delta: Delta,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum Delta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

/// Payload of an `error` stream event.
#[derive(Debug, Deserialize)]
pub(crate) struct StreamErrorEvent {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDetail {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}
