use super::sse;
use super::types::{MessagesRequest, MessagesResponse};
use crate::ai::{MessagesTransport, TextDeltaStream};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

const MESSAGES_PATH: &str = "/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// Messages API transport over a pooled reqwest client.
///
/// `timeout` bounds one-shot requests only. Streamed responses stay open as
/// long as the server keeps sending; the connect timeout still applies.
pub struct AnthropicHttpClient {
    client: Client,
    api_key: SecretString,
    base_url: String,
    timeout: Duration,
}

impl AnthropicHttpClient {
    pub fn new(api_key: &SecretString, base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::new_with_client(api_key, base_url, timeout, client))
    }

    pub fn new_with_client(
        api_key: &SecretString,
        base_url: &str,
        timeout: Duration,
        client: Client,
    ) -> Self {
        Self {
            client,
            api_key: SecretString::from(api_key.expose_secret().to_owned()),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    fn post(&self, request: &MessagesRequest) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url, MESSAGES_PATH))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .json(request)
    }
}

#[async_trait]
impl MessagesTransport for AnthropicHttpClient {
    async fn create_message(&self, request: &MessagesRequest) -> Result<MessagesResponse> {
        tracing::debug!(model = %request.model, "Sending message request to Anthropic");

        let response = self
            .post(request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::Api(format!("Failed to send request to Anthropic: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Api(format!("Failed to read Anthropic response: {}", e)))?;

        if !status.is_success() {
            return Err(Error::Api(format!(
                "Anthropic API error (status {}): {}",
                status, body
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::debug!("Unparseable Anthropic response body: {}", body);
            Error::Api(format!("Failed to parse Anthropic response: {}", e))
        })
    }

    async fn stream_message(&self, request: &MessagesRequest) -> Result<TextDeltaStream> {
        tracing::debug!(model = %request.model, "Opening Anthropic message stream");

        let response = self
            .post(request)
            .send()
            .await
            .map_err(|e| Error::Stream(format!("Failed to open Anthropic stream: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Stream(format!(
                "Anthropic API error (status {}): {}",
                status, body
            )));
        }

        Ok(sse::text_deltas(response.bytes_stream()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::anthropic::types::{ContentBlock, Message, ROLE_USER};
    use futures::StreamExt;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_client(server: &MockServer) -> AnthropicHttpClient {
        AnthropicHttpClient::new(
            &SecretString::from("test-key"),
            &server.uri(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn request(stream: Option<bool>) -> MessagesRequest {
        MessagesRequest {
            model: "claude-test".to_string(),
            max_tokens: 128,
            temperature: 0.5,
            system: "You are a test.".to_string(),
            messages: vec![Message {
                role: ROLE_USER.to_string(),
                content: vec![ContentBlock::text("Hi")],
            }],
            stream,
        }
    }

    #[tokio::test]
    async fn test_create_message_sends_headers_and_parses_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(body_partial_json(serde_json::json!({
                "model": "claude-test",
                "max_tokens": 128,
                "system": "You are a test.",
                "messages": [{ "role": "user", "content": [{ "type": "text", "text": "Hi" }] }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "msg_01",
                "type": "message",
                "role": "assistant",
                "content": [{ "type": "text", "text": "Hello!" }],
                "stop_reason": "end_turn"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = make_client(&server)
            .create_message(&request(None))
            .await
            .unwrap();

        assert_eq!(response.text(), "Hello!");
        assert_eq!(response.stop_reason.as_deref(), Some("end_turn"));
    }

    #[tokio::test]
    async fn test_trailing_slash_in_base_url_is_ignored() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = AnthropicHttpClient::new(
            &SecretString::from("test-key"),
            &format!("{}/", server.uri()),
            Duration::from_secs(5),
        )
        .unwrap();

        client.create_message(&request(None)).await.unwrap();
    }

    #[tokio::test]
    async fn test_status_error_returns_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid x-api-key"))
            .mount(&server)
            .await;

        let err = make_client(&server)
            .create_message(&request(None))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Api(ref m) if m.contains("401") && m.contains("invalid x-api-key")));
    }

    #[tokio::test]
    async fn test_malformed_body_returns_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
            .mount(&server)
            .await;

        let err = make_client(&server)
            .create_message(&request(None))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Api(_)));
    }

    #[tokio::test]
    async fn test_stream_message_decodes_sse_body() {
        let server = MockServer::start().await;
        let body = concat!(
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hel\"}}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"lo\"}}\n\n",
            "event: message_stop\n",
            "data: {\"type\":\"message_stop\"}\n\n",
        );

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(body_partial_json(serde_json::json!({ "stream": true })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .expect(1)
            .mount(&server)
            .await;

        let stream = make_client(&server)
            .stream_message(&request(Some(true)))
            .await
            .unwrap();
        let fragments: Vec<String> = stream.map(|r| r.unwrap()).collect().await;

        assert_eq!(fragments, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn test_stream_status_error_returns_stream_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let result = make_client(&server)
            .stream_message(&request(Some(true)))
            .await;

        assert!(matches!(result, Err(Error::Stream(ref m)) if m.contains("529")));
    }
}
