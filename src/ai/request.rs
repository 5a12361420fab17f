//! Assembly of per-call request payloads.

use super::anthropic::types::{ContentBlock, Message, MessagesRequest, ROLE_USER};
use crate::config::{AiConfig, DEFAULT_SYSTEM_PROMPT};
use crate::{Error, Result};
use base64::Engine as _;
use std::path::Path;

/// Builds a fresh [`MessagesRequest`] for each call from the model settings.
///
/// A request carries at most one image, placed before the text block. The
/// image is always labelled `image/png`; no format sniffing is done.
pub struct RequestBuilder<'a> {
    config: &'a AiConfig,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(config: &'a AiConfig) -> Self {
        Self { config }
    }

    /// Fails with [`Error::Io`] when `image_path` cannot be read. Nothing
    /// else is validated; an empty `message` yields an empty text block.
    pub fn build(
        &self,
        message: &str,
        system_prompt: Option<&str>,
        image_path: Option<&Path>,
    ) -> Result<MessagesRequest> {
        let mut content = Vec::with_capacity(2);

        if let Some(path) = image_path {
            tracing::debug!("Including image: {}", path.display());
            content.push(read_image(path)?);
        }

        content.push(ContentBlock::text(message));

        Ok(MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system: self.system_prompt(system_prompt),
            messages: vec![Message {
                role: ROLE_USER.to_string(),
                content,
            }],
            stream: None,
        })
    }

    fn system_prompt(&self, requested: Option<&str>) -> String {
        match requested {
            Some(prompt) if !prompt.is_empty() => prompt.to_string(),
            _ if !self.config.system_prompt.is_empty() => self.config.system_prompt.clone(),
            _ => DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

fn read_image(path: &Path) -> Result<ContentBlock> {
    let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    Ok(ContentBlock::png_base64(
        base64::engine::general_purpose::STANDARD.encode(bytes),
    ))
}
