//! Claude API integration
//!
//! [`AiClient`] is the entry point: it builds multimodal requests, performs
//! one-shot calls and exposes streamed replies as a [`TextStream`]. The wire
//! itself sits behind [`MessagesTransport`] so the HTTP implementation can be
//! swapped for [`MockTransport`] in tests.

pub mod anthropic;
pub mod client;
pub mod mock;
pub mod request;
pub mod stream;

pub use anthropic::{AnthropicHttpClient, ContentBlock, MessagesRequest, MessagesResponse};
pub use client::AiClient;
pub use mock::{MockFragment, MockReply, MockTransport};
pub use request::RequestBuilder;
pub use stream::TextStream;

use crate::Result;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Text fragments in generation order. Dropping the stream closes the
/// session it was read from.
pub type TextDeltaStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[async_trait]
pub trait MessagesTransport: Send + Sync {
    /// One complete request/response round trip.
    async fn create_message(&self, request: &MessagesRequest) -> Result<MessagesResponse>;

    /// Open a streamed response.
    async fn stream_message(&self, request: &MessagesRequest) -> Result<TextDeltaStream>;
}
