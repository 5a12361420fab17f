//! Server-sent event decoding for streamed Messages API responses.
//!
//! Only text deltas are surfaced. `message_stop` ends the stream and an
//! `error` event fails it; everything else is bookkeeping and is skipped.

use super::types::{ContentBlockDeltaEvent, Delta, StreamErrorEvent};
use crate::ai::TextDeltaStream;
use crate::{Error, Result};
use eventsource_stream::{Event, Eventsource};
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;

#[derive(Debug, PartialEq)]
pub(crate) enum SseOutcome {
    Text(String),
    Done,
    Skip,
}

pub(crate) fn interpret_event(event: &Event) -> Result<SseOutcome> {
    match event.event.as_str() {
        "content_block_delta" => {
            let payload: ContentBlockDeltaEvent = parse_payload(event)?;
            Ok(match payload.delta {
                Delta::TextDelta { text } => SseOutcome::Text(text),
                Delta::Other => SseOutcome::Skip,
            })
        }
        "message_stop" => Ok(SseOutcome::Done),
        "error" => {
            let payload: StreamErrorEvent = parse_payload(event)?;
            Err(Error::Stream(format!(
                "{}: {}",
                payload.error.error_type, payload.error.message
            )))
        }
        other => {
            tracing::trace!(event = other, "Skipping stream event");
            Ok(SseOutcome::Skip)
        }
    }
}

fn parse_payload<T: DeserializeOwned>(event: &Event) -> Result<T> {
    serde_json::from_str(&event.data)
        .map_err(|e| Error::Stream(format!("Malformed {} event: {}", event.event, e)))
}

/// Decode a raw SSE byte stream into text fragments.
///
/// The returned stream owns `bytes`; dropping it closes the underlying
/// connection. A body that ends without `message_stop` counts as interrupted.
pub(crate) fn text_deltas<S, B, E>(bytes: S) -> TextDeltaStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut events = Box::pin(bytes.eventsource());

        while let Some(event) = events.next().await {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    yield Err(Error::Stream(format!("Stream interrupted: {}", e)));
                    return;
                }
            };

            match interpret_event(&event) {
                Ok(SseOutcome::Text(text)) => yield Ok(text),
                Ok(SseOutcome::Done) => return,
                Ok(SseOutcome::Skip) => {}
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }

        yield Err(Error::Stream(
            "Stream ended before message_stop".to_string(),
        ));
    })
}
