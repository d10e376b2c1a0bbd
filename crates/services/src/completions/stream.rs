use bytes::Bytes;
use futures::{future::BoxFuture, Stream};
use inference_providers::{ByteStream, ProviderError, ProviderId};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use tracing::{debug, info, warn};

/// Unbuffered pass-through of an upstream completion stream
///
/// Each upstream chunk is handed on as soon as it is polled, in order. The
/// stream ends early when the gateway shuts down. Dropping it drops the
/// upstream response, which closes the upstream connection.
pub struct ProxyStream {
    inner: ByteStream,
    shutdown: BoxFuture<'static, ()>,
    provider: ProviderId,
    request_id: String,
    chunks: usize,
    bytes: usize,
    finished: bool,
}

impl ProxyStream {
    pub fn new(
        inner: ByteStream,
        provider: ProviderId,
        request_id: String,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Self {
        Self {
            inner,
            shutdown: Box::pin(shutdown),
            provider,
            request_id,
            chunks: 0,
            bytes: 0,
            finished: false,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

impl Stream for ProxyStream {
    type Item = Result<Bytes, ProviderError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        if this.shutdown.as_mut().poll(cx).is_ready() {
            this.finished = true;
            info!(
                request_id = %this.request_id,
                provider = %this.provider,
                chunks = this.chunks,
                "Ending stream for gateway shutdown"
            );
            return Poll::Ready(None);
        }

        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.chunks += 1;
                this.bytes += chunk.len();
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.finished = true;
                warn!(
                    request_id = %this.request_id,
                    provider = %this.provider,
                    chunks = this.chunks,
                    error = %e,
                    "Upstream stream failed"
                );
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.finished = true;
                debug!(
                    request_id = %this.request_id,
                    provider = %this.provider,
                    chunks = this.chunks,
                    bytes = this.bytes,
                    "Upstream stream completed"
                );
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for ProxyStream {
    fn drop(&mut self) {
        if !self.finished {
            info!(
                request_id = %self.request_id,
                provider = %self.provider,
                chunks = self.chunks,
                bytes = self.bytes,
                "Client went away, closing upstream stream"
            );
        }
    }
}
