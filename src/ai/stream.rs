//! Consumer-facing handle over a streamed reply.

use super::TextDeltaStream;
use crate::Result;
use futures::stream::{FusedStream, Stream};
use std::pin::Pin;
use std::task::{ready, Context, Poll};

/// Finite, non-restartable sequence of reply fragments.
///
/// The stream owns the network session. The session is released as soon as
/// the reply completes or fails, or when the stream is dropped before that.
/// After it ends or yields an error, every later poll returns `None`; a new
/// call is needed to try again.
pub struct TextStream {
    session: Option<TextDeltaStream>,
    operation: &'static str,
    fragments: usize,
    chars: usize,
}

impl TextStream {
    pub(crate) fn new(operation: &'static str, session: TextDeltaStream) -> Self {
        Self {
            session: Some(session),
            operation,
            fragments: 0,
            chars: 0,
        }
    }

    /// Fragments delivered so far.
    pub fn fragments_received(&self) -> usize {
        self.fragments
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }
}

impl Stream for TextStream {
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(session) = this.session.as_mut() else {
            return Poll::Ready(None);
        };

        match ready!(session.as_mut().poll_next(cx)) {
            Some(Ok(fragment)) => {
                this.fragments += 1;
                this.chars += fragment.chars().count();
                Poll::Ready(Some(Ok(fragment)))
            }
            Some(Err(err)) => {
                this.session = None;
                tracing::error!(
                    operation = this.operation,
                    fragments = this.fragments,
                    "Streaming failed: {}",
                    err
                );
                Poll::Ready(Some(Err(err)))
            }
            None => {
                this.session = None;
                tracing::info!(
                    "Streamed response ({} chars in {} fragments)",
                    this.chars,
                    this.fragments
                );
                tracing::debug!("{} completed successfully", this.operation);
                Poll::Ready(None)
            }
        }
    }
}

impl FusedStream for TextStream {
    fn is_terminated(&self) -> bool {
        self.session.is_none()
    }
}

impl Drop for TextStream {
    fn drop(&mut self) {
        if self.session.take().is_some() {
            tracing::debug!(
                operation = self.operation,
                fragments = self.fragments,
                "Stream dropped before completion, closing session"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct ReleaseFlag(Arc<AtomicBool>);

    impl Drop for ReleaseFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    fn tracked(items: Vec<Result<String>>) -> (TextStream, Arc<AtomicBool>) {
        let released = Arc::new(AtomicBool::new(false));
        let flag = ReleaseFlag(Arc::clone(&released));
        let session = Box::pin(async_stream::stream! {
            let _flag = flag;
            for item in items {
                yield item;
            }
        });
        (TextStream::new("test", session), released)
    }

    #[tokio::test]
    async fn test_completion_releases_session() {
        let (mut stream, released) = tracked(vec![Ok("Hel".to_string()), Ok("lo".to_string())]);

        assert_eq!(stream.next().await.unwrap().unwrap(), "Hel");
        assert_eq!(stream.next().await.unwrap().unwrap(), "lo");
        assert!(!released.load(Ordering::SeqCst));

        assert!(stream.next().await.is_none());
        assert!(released.load(Ordering::SeqCst));
        assert!(stream.is_terminated());
        assert_eq!(stream.fragments_received(), 2);
    }

    #[tokio::test]
    async fn test_early_drop_releases_session() {
        let (mut stream, released) = tracked(vec![Ok("a".to_string()), Ok("b".to_string())]);

        stream.next().await.unwrap().unwrap();
        assert!(stream.is_open());
        drop(stream);

        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_error_releases_session_and_fuses() {
        let (mut stream, released) = tracked(vec![
            Ok("partial".to_string()),
            Err(Error::Stream("connection reset".to_string())),
            Ok("never".to_string()),
        ]);

        assert_eq!(stream.next().await.unwrap().unwrap(), "partial");
        assert!(matches!(stream.next().await, Some(Err(Error::Stream(_)))));
        assert!(released.load(Ordering::SeqCst));

        assert!(stream.next().await.is_none());
        assert!(stream.next().await.is_none());
    }
}
