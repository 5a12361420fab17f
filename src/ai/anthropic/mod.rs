pub mod client;
pub(crate) mod sse;
pub mod types;

pub use client::AnthropicHttpClient;
pub use types::{
    extract_text, ContentBlock, ImageSource, Message, MessagesRequest, MessagesResponse,
};
