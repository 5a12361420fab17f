use super::anthropic::AnthropicHttpClient;
use super::request::RequestBuilder;
use super::stream::TextStream;
use super::MessagesTransport;
use crate::config::Config;
use crate::Result;
use futures::StreamExt;
use secrecy::SecretString;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Claude client shared by the shell's front ends.
///
/// Holds the settings snapshot and one transport. Both are read-only after
/// construction, so a client can serve concurrent calls without locking.
pub struct AiClient {
    config: Arc<Config>,
    transport: Arc<dyn MessagesTransport>,
}

impl AiClient {
    /// Connect to the Anthropic API using the configured credential.
    pub fn new(config: Arc<Config>) -> Result<Self> {
        Self::connect(config, |config, api_key| {
            AnthropicHttpClient::new(
                api_key,
                &config.ai.base_url,
                Duration::from_secs(config.ai.timeout_secs),
            )
        })
    }

    /// Build a client around the transport produced by `make_transport`.
    ///
    /// Settings and credential are validated first; `make_transport` is not
    /// invoked when either is unusable.
    pub fn connect<T, F>(config: Arc<Config>, make_transport: F) -> Result<Self>
    where
        T: MessagesTransport + 'static,
        F: FnOnce(&Config, &SecretString) -> Result<T>,
    {
        config.validate()?;
        let api_key = config.require_api_key()?;
        let transport = make_transport(&config, api_key)?;

        info!("AI client initialized with model: {}", config.ai.model);

        Ok(Self {
            config,
            transport: Arc::new(transport),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Send a message and wait for the complete reply.
    ///
    /// `image_path`, when given, is attached ahead of the text. Transport
    /// failures are returned unchanged; nothing is retried.
    pub async fn send_message(
        &self,
        message: &str,
        system_prompt: Option<&str>,
        image_path: Option<&Path>,
    ) -> Result<String> {
        debug!(operation = "send_message", "Executing send_message");

        let request = RequestBuilder::new(&self.config.ai)
            .build(message, system_prompt, image_path)
            .map_err(|e| {
                error!(operation = "send_message", "Failed to build request: {}", e);
                e
            })?;

        let response = self
            .transport
            .create_message(&request)
            .await
            .map_err(|e| {
                error!(operation = "send_message", "API call failed: {}", e);
                e
            })?;

        debug!(
            id = response.id.as_deref().unwrap_or("-"),
            model = response.model.as_deref().unwrap_or("-"),
            stop_reason = response.stop_reason.as_deref().unwrap_or("-"),
            "Message completed"
        );
        if let Some(usage) = response.usage {
            debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "Token usage"
            );
        }

        let text = response.text();
        info!("Received response ({} chars)", text.chars().count());
        debug!("send_message completed successfully");
        Ok(text)
    }

    /// Stream the reply to a text-only message.
    ///
    /// Nothing is sent until the returned stream is first polled. See
    /// [`TextStream`] for termination and session release.
    pub fn stream_message(&self, message: &str, system_prompt: Option<&str>) -> Result<TextStream> {
        debug!(operation = "stream_message", "Executing stream_message");

        let mut request = RequestBuilder::new(&self.config.ai).build(message, system_prompt, None)?;
        request.stream = Some(true);

        let transport = Arc::clone(&self.transport);
        let session = Box::pin(async_stream::stream! {
            let mut deltas = match transport.stream_message(&request).await {
                Ok(deltas) => deltas,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            while let Some(delta) = deltas.next().await {
                yield delta;
            }
        });

        Ok(TextStream::new("stream_message", session))
    }
}
