//! Bridges between pipelines and async code.
//!
//! Pipelines are driven synchronously. These adapters let async producers
//! and streams feed a pipeline, and let async code consume a pipeline as a
//! stream.

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use futures::executor::{block_on_stream, BlockingStream};
use futures_core::Stream;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::core::{Producer, Result, Sink};
use crate::error::Error;
use crate::pipeline::Pipeline;

/// A producer that awaits its next item.
///
/// Wrap one in a [`BlockingProducer`] to use it as a pipeline source.
#[async_trait]
pub trait AsyncProducer: Send {
    /// The type of items this producer generates
    type Item: Send;

    /// Produce the next item, or None if the producer is exhausted.
    async fn produce(&mut self) -> Result<Option<Self::Item>>;
}

/// Helper function to create an async producer from a function returning futures
pub fn async_from_fn<F, Fut, T>(f: F) -> AsyncFnProducer<F, Fut, T>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<Option<T>>> + Send,
    T: Send + 'static,
{
    AsyncFnProducer {
        f,
        _phantom: PhantomData,
    }
}

/// An async producer created from a function
pub struct AsyncFnProducer<F, Fut, T> {
    f: F,
    _phantom: PhantomData<fn() -> (Fut, T)>,
}

#[async_trait]
impl<F, Fut, T> AsyncProducer for AsyncFnProducer<F, Fut, T>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<Option<T>>> + Send,
    T: Send + 'static,
{
    type Item = T;

    async fn produce(&mut self) -> Result<Option<Self::Item>> {
        (self.f)().await
    }
}

/// Drives an [`AsyncProducer`] to completion for every pull on a tokio runtime.
///
/// Pulling blocks the current thread, so a pipeline built on this producer
/// must be driven off the async workers: inside `spawn_blocking`, through
/// [`Pipeline::collect_parallel`], [`Pipeline::into_stream`], or from a
/// plain thread.
pub struct BlockingProducer<P> {
    inner: P,
    handle: Handle,
}

impl<P: AsyncProducer> BlockingProducer<P> {
    pub fn new(inner: P, handle: Handle) -> Self {
        Self { inner, handle }
    }

    /// Use the runtime of the calling context.
    pub fn current(inner: P) -> Result<Self> {
        let handle = Handle::try_current().map_err(|e| Error::custom(e.to_string()))?;
        Ok(Self::new(inner, handle))
    }
}

impl<P: AsyncProducer> Producer for BlockingProducer<P> {
    type Item = P::Item;

    fn produce(&mut self) -> Result<Option<Self::Item>> {
        self.handle.block_on(self.inner.produce())
    }
}

/// Pulls the items of a [`Stream`] by blocking on each one.
pub struct StreamProducer<S: Stream + Unpin> {
    inner: BlockingStream<S>,
}

impl<S: Stream + Unpin> StreamProducer<S> {
    pub fn new(stream: S) -> Self {
        Self {
            inner: block_on_stream(stream),
        }
    }
}

impl<S: Stream + Unpin> Producer for StreamProducer<S> {
    type Item = S::Item;

    fn produce(&mut self) -> Result<Option<Self::Item>> {
        Ok(self.inner.next())
    }
}

/// Sends every element into a bounded channel; stops once the receiver is gone.
struct ChannelSink<'a, T> {
    tx: &'a mpsc::Sender<Result<T>>,
    closed: bool,
}

impl<T> Sink for ChannelSink<'_, T> {
    type Item = T;

    fn accept(&mut self, item: T) -> Result<()> {
        if self.tx.blocking_send(Ok(item)).is_err() {
            self.closed = true;
        }
        Ok(())
    }

    fn should_stop(&self) -> bool {
        self.closed || self.tx.is_closed()
    }
}

impl<T: Send + 'static> Pipeline<T> {
    /// Drive the pipeline on a blocking task, yielding elements as a stream.
    ///
    /// The channel between the drive and the stream holds at most
    /// [`channel_capacity`](Pipeline::channel_capacity) elements. A failed
    /// drive yields its error as the last item. Dropping the stream stops the
    /// drive before the next pull.
    ///
    /// Must be called from within a tokio runtime.
    pub fn into_stream(self) -> ReceiverStream<Result<T>> {
        let (tx, rx) = mpsc::channel(self.config().channel_capacity.max(1));
        tokio::task::spawn_blocking(move || {
            let mut sink = ChannelSink {
                tx: &tx,
                closed: false,
            };
            if let Err(e) = self.drive_into(&mut sink) {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %e, "pipeline stream drive failed");
                let _ = tx.blocking_send(Err(e));
            }
        });
        ReceiverStream::new(rx)
    }
}
