use super::anthropic::types::{ContentBlock, MessagesRequest, MessagesResponse};
use super::{MessagesTransport, TextDeltaStream};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Canned outcome of a one-shot call.
#[derive(Debug, Clone)]
pub enum MockReply {
    Content(Vec<ContentBlock>),
    /// Fails with [`Error::Api`] carrying this message.
    Fail(String),
}

/// One step of a scripted stream.
#[derive(Debug, Clone)]
pub enum MockFragment {
    Text(String),
    /// Fails with [`Error::Stream`] carrying this message and ends the stream.
    Fail(String),
}

/// In-memory transport that records requests and replays scripted replies.
///
/// Clones share state, so a test can keep one handle for inspection after
/// handing another to the client.
#[derive(Clone, Default)]
pub struct MockTransport {
    replies: Arc<Mutex<Vec<MockReply>>>,
    streams: Arc<Mutex<Vec<Vec<MockFragment>>>>,
    requests: Arc<Mutex<Vec<MessagesRequest>>>,
    open_sessions: Arc<AtomicUsize>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text_response(self, text: &str) -> Self {
        self.with_reply(MockReply::Content(vec![ContentBlock::text(text)]))
    }

    pub fn with_failure(self, message: &str) -> Self {
        self.with_reply(MockReply::Fail(message.to_string()))
    }

    pub fn with_reply(self, reply: MockReply) -> Self {
        self.replies.lock().unwrap().push(reply);
        self
    }

    pub fn with_stream(self, fragments: Vec<MockFragment>) -> Self {
        self.streams.lock().unwrap().push(fragments);
        self
    }

    /// Number of requests that reached the transport.
    pub fn get_call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<MessagesRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Streams handed out and not yet released.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    fn record(&self, request: &MessagesRequest) -> usize {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        requests.len()
    }
}

struct SessionGuard(Arc<AtomicUsize>);

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn echo(request: &MessagesRequest) -> String {
    format!("Mock reply to: {}", super::anthropic::extract_text(request.content()))
}

#[async_trait]
impl MessagesTransport for MockTransport {
    async fn create_message(&self, request: &MessagesRequest) -> Result<MessagesResponse> {
        let count = self.record(request);

        let reply = {
            let replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                MockReply::Content(vec![ContentBlock::text(echo(request))])
            } else {
                replies[(count - 1) % replies.len()].clone()
            }
        };

        match reply {
            MockReply::Content(content) => Ok(MessagesResponse {
                id: Some(format!("msg_mock_{}", count)),
                model: Some(request.model.clone()),
                content,
                stop_reason: Some("end_turn".to_string()),
                usage: None,
            }),
            MockReply::Fail(message) => Err(Error::Api(message)),
        }
    }

    async fn stream_message(&self, request: &MessagesRequest) -> Result<TextDeltaStream> {
        self.record(request);

        let fragments = {
            let mut streams = self.streams.lock().unwrap();
            if streams.is_empty() {
                echo(request)
                    .split_inclusive(' ')
                    .map(|word| MockFragment::Text(word.to_string()))
                    .collect()
            } else {
                streams.remove(0)
            }
        };

        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        let guard = SessionGuard(Arc::clone(&self.open_sessions));

        Ok(Box::pin(async_stream::stream! {
            let _session = guard;
            for fragment in fragments {
                match fragment {
                    MockFragment::Text(text) => yield Ok(text),
                    MockFragment::Fail(message) => {
                        yield Err(Error::Stream(message));
                        return;
                    }
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::RequestBuilder;
    use crate::config::AiConfig;
    use futures::StreamExt;

    fn request(text: &str) -> MessagesRequest {
        RequestBuilder::new(&AiConfig::default())
            .build(text, None, None)
            .unwrap()
    }

    #[tokio::test]
    async fn test_mock_default_reply_echoes_message() {
        let mock = MockTransport::new();

        let response = mock.create_message(&request("ping")).await.unwrap();
        assert_eq!(response.text(), "Mock reply to: ping");
    }

    #[tokio::test]
    async fn test_mock_replies_cycle() {
        let mock = MockTransport::new()
            .with_text_response("first")
            .with_text_response("second");

        assert_eq!(mock.create_message(&request("a")).await.unwrap().text(), "first");
        assert_eq!(mock.create_message(&request("b")).await.unwrap().text(), "second");
        assert_eq!(mock.create_message(&request("c")).await.unwrap().text(), "first");
        assert_eq!(mock.get_call_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_stream_tracks_open_sessions() {
        let mock = MockTransport::new().with_stream(vec![
            MockFragment::Text("x".to_string()),
            MockFragment::Text("y".to_string()),
        ]);

        let mut stream = mock.stream_message(&request("hi")).await.unwrap();
        assert_eq!(mock.open_sessions(), 1);

        assert_eq!(stream.next().await.unwrap().unwrap(), "x");
        drop(stream);
        assert_eq!(mock.open_sessions(), 0);
    }
}
