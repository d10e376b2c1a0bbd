//! Byte stream wrapper enforcing the inter-chunk idle timeout

use crate::{ProviderError, ProviderId};
use bytes::Bytes;
use futures_core::Stream;
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use tokio::time::{Instant, Sleep};

type InnerStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

/// Passes upstream chunks through unchanged and fails the stream with
/// `ProviderError::Timeout` when no chunk arrives within `idle`
///
/// The stream ends after yielding the first error.
pub struct IdleTimeoutStream {
    inner: InnerStream,
    provider: ProviderId,
    idle: Duration,
    deadline: Pin<Box<Sleep>>,
    done: bool,
}

impl IdleTimeoutStream {
    pub fn new<S>(inner: S, provider: ProviderId, idle: Duration) -> Self
    where
        S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    {
        Self {
            inner: Box::pin(inner),
            provider,
            idle,
            deadline: Box::pin(tokio::time::sleep(idle)),
            done: false,
        }
    }
}

impl Stream for IdleTimeoutStream {
    type Item = Result<Bytes, ProviderError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                let next = Instant::now() + this.idle;
                this.deadline.as_mut().reset(next);
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.done = true;
                Poll::Ready(Some(Err(ProviderError::from_reqwest(
                    this.provider,
                    e,
                    "stream body",
                ))))
            }
            Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => match this.deadline.as_mut().poll(cx) {
                Poll::Ready(()) => {
                    this.done = true;
                    tracing::warn!(
                        provider = %this.provider,
                        idle_secs = this.idle.as_secs_f64(),
                        "Upstream stream idle timeout"
                    );
                    Poll::Ready(Some(Err(ProviderError::Timeout {
                        provider: this.provider,
                        during: "next stream chunk",
                    })))
                }
                Poll::Pending => Poll::Pending,
            },
        }
    }
}
