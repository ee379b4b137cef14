//! The persistent link graph behind a [`Pipeline`](super::Pipeline).
//!
//! A pipeline is an `Arc` to its last link. The root link owns the producer,
//! stage links own one stage descriptor and point at their upstream, and
//! chain links concatenate two graphs. Links are never mutated after
//! construction except for the producer slot, which the first drive empties.

use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::core::{Error, Producer, Result, Sink, Stage, StageKind};
use crate::producers::SinglePass;

type BoxedProducer<T> = Box<dyn Producer<Item = T> + Send>;

/// Per-drive bookkeeping shared by every link of one drive.
#[derive(Debug, Default)]
pub(crate) struct DriveContext {
    cancellation: Option<CancellationToken>,
    pub(crate) pulled: u64,
    pub(crate) short_circuited: bool,
}

impl DriveContext {
    pub(crate) fn new(cancellation: Option<CancellationToken>) -> Self {
        Self {
            cancellation,
            pulled: 0,
            short_circuited: false,
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancellation {
            Some(token) if token.is_cancelled() => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }
}

pub(crate) trait Link<T>: Send + Sync {
    /// Pull everything upstream of this link into `sink`, then finish it once.
    fn drive(&self, sink: &mut dyn Sink<Item = T>, ctx: &mut DriveContext) -> Result<()>;

    /// Stage kinds from source to this link
    fn stages(&self, out: &mut Vec<StageKind>);

    /// Whether chunks of the source can be pushed through independently
    fn parallel_safe(&self) -> bool;

    /// Take the producer(s) and hand out independent chunks of work.
    fn chunks(self: Arc<Self>) -> Result<Box<dyn ChunkSource<T>>>;
}

/// Hands out consecutive chunks of a pipeline's elements.
pub(crate) trait ChunkSource<T>: Send {
    fn next_chunk(
        &mut self,
        size: usize,
        ctx: &mut DriveContext,
    ) -> Result<Option<Box<dyn ChunkTask<T>>>>;
}

/// One pulled chunk, ready to be pushed through the stages into a sink.
pub(crate) trait ChunkTask<T>: Send {
    fn run(self: Box<Self>, sink: &mut dyn Sink<Item = T>) -> Result<()>;
}

pub(crate) struct SourceLink<T> {
    producer: Mutex<Option<BoxedProducer<T>>>,
}

impl<T> SourceLink<T> {
    pub(crate) fn new<P>(producer: P) -> Self
    where
        P: Producer<Item = T> + Send + 'static,
    {
        Self {
            producer: Mutex::new(Some(Box::new(SinglePass::new(producer)))),
        }
    }

    fn take(&self) -> Result<BoxedProducer<T>> {
        self.producer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(Error::ConsumedPipeline)
    }
}

impl<T: Send + 'static> Link<T> for SourceLink<T> {
    fn drive(&self, sink: &mut dyn Sink<Item = T>, ctx: &mut DriveContext) -> Result<()> {
        let mut producer = self.take()?;
        loop {
            if sink.should_stop() {
                ctx.short_circuited = true;
                break;
            }
            ctx.check_cancelled()?;
            match producer.produce()? {
                Some(item) => {
                    ctx.pulled += 1;
                    sink.accept(item)?;
                }
                None => break,
            }
        }
        sink.finish()
    }

    fn stages(&self, _out: &mut Vec<StageKind>) {}

    fn parallel_safe(&self) -> bool {
        true
    }

    fn chunks(self: Arc<Self>) -> Result<Box<dyn ChunkSource<T>>> {
        Ok(Box::new(ProducerChunks {
            producer: Some(self.take()?),
        }))
    }
}

struct ProducerChunks<T> {
    producer: Option<BoxedProducer<T>>,
}

impl<T: Send + 'static> ChunkSource<T> for ProducerChunks<T> {
    fn next_chunk(
        &mut self,
        size: usize,
        ctx: &mut DriveContext,
    ) -> Result<Option<Box<dyn ChunkTask<T>>>> {
        let Some(producer) = self.producer.as_mut() else {
            return Ok(None);
        };
        let mut items = Vec::with_capacity(size);
        while items.len() < size {
            ctx.check_cancelled()?;
            match producer.produce()? {
                Some(item) => {
                    ctx.pulled += 1;
                    items.push(item);
                }
                None => {
                    self.producer = None;
                    break;
                }
            }
        }
        if items.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Box::new(VecChunk(items))))
        }
    }
}

struct VecChunk<T>(Vec<T>);

impl<T: Send> ChunkTask<T> for VecChunk<T> {
    fn run(self: Box<Self>, sink: &mut dyn Sink<Item = T>) -> Result<()> {
        for item in self.0 {
            if sink.should_stop() {
                break;
            }
            sink.accept(item)?;
        }
        sink.finish()
    }
}

pub(crate) struct StageLink<S: Stage> {
    stage: S,
    upstream: Arc<dyn Link<S::Input>>,
}

impl<S: Stage> StageLink<S> {
    pub(crate) fn new(stage: S, upstream: Arc<dyn Link<S::Input>>) -> Self {
        Self { stage, upstream }
    }
}

impl<S> Link<S::Output> for StageLink<S>
where
    S: Stage,
    S::Input: Send + 'static,
    S::Output: Send + 'static,
{
    fn drive(&self, sink: &mut dyn Sink<Item = S::Output>, ctx: &mut DriveContext) -> Result<()> {
        let mut wrapped = self.stage.wrap(sink);
        self.upstream.drive(&mut *wrapped, ctx)
    }

    fn stages(&self, out: &mut Vec<StageKind>) {
        self.upstream.stages(out);
        out.push(self.stage.kind());
    }

    fn parallel_safe(&self) -> bool {
        !self.stage.kind().is_stateful() && self.upstream.parallel_safe()
    }

    fn chunks(self: Arc<Self>) -> Result<Box<dyn ChunkSource<S::Output>>> {
        let inner = Arc::clone(&self.upstream).chunks()?;
        Ok(Box::new(StageChunks { link: self, inner }))
    }
}

struct StageChunks<S: Stage> {
    link: Arc<StageLink<S>>,
    inner: Box<dyn ChunkSource<S::Input>>,
}

impl<S> ChunkSource<S::Output> for StageChunks<S>
where
    S: Stage,
    S::Input: Send + 'static,
    S::Output: Send + 'static,
{
    fn next_chunk(
        &mut self,
        size: usize,
        ctx: &mut DriveContext,
    ) -> Result<Option<Box<dyn ChunkTask<S::Output>>>> {
        Ok(self.inner.next_chunk(size, ctx)?.map(|inner| {
            Box::new(StageChunk {
                link: Arc::clone(&self.link),
                inner,
            }) as Box<dyn ChunkTask<S::Output>>
        }))
    }
}

struct StageChunk<S: Stage> {
    link: Arc<StageLink<S>>,
    inner: Box<dyn ChunkTask<S::Input>>,
}

impl<S> ChunkTask<S::Output> for StageChunk<S>
where
    S: Stage,
    S::Input: Send + 'static,
    S::Output: Send + 'static,
{
    fn run(self: Box<Self>, sink: &mut dyn Sink<Item = S::Output>) -> Result<()> {
        let StageChunk { link, inner } = *self;
        let mut wrapped = link.stage.wrap(sink);
        inner.run(&mut *wrapped)
    }
}

/// Everything from `first`, then everything from `second`.
///
/// Driving a chain always takes both producers, so both source pipelines are
/// consumed even when the first half short-circuits.
pub(crate) struct ChainLink<T> {
    first: Arc<dyn Link<T>>,
    second: Arc<dyn Link<T>>,
}

impl<T> ChainLink<T> {
    pub(crate) fn new(first: Arc<dyn Link<T>>, second: Arc<dyn Link<T>>) -> Self {
        Self { first, second }
    }
}

/// Forwards to a sink but leaves finishing to the caller.
struct NoFinish<'a, T> {
    inner: &'a mut dyn Sink<Item = T>,
}

impl<T> Sink for NoFinish<'_, T> {
    type Item = T;

    fn accept(&mut self, item: T) -> Result<()> {
        self.inner.accept(item)
    }

    fn should_stop(&self) -> bool {
        self.inner.should_stop()
    }
}

impl<T: Send + 'static> Link<T> for ChainLink<T> {
    fn drive(&self, sink: &mut dyn Sink<Item = T>, ctx: &mut DriveContext) -> Result<()> {
        self.first.drive(&mut NoFinish { inner: &mut *sink }, ctx)?;
        self.second.drive(sink, ctx)
    }

    fn stages(&self, out: &mut Vec<StageKind>) {
        self.first.stages(out);
        self.second.stages(out);
    }

    fn parallel_safe(&self) -> bool {
        self.first.parallel_safe() && self.second.parallel_safe()
    }

    fn chunks(self: Arc<Self>) -> Result<Box<dyn ChunkSource<T>>> {
        let first = Arc::clone(&self.first).chunks()?;
        let second = Arc::clone(&self.second).chunks()?;
        Ok(Box::new(ChainChunks {
            first: Some(first),
            second,
        }))
    }
}

struct ChainChunks<T> {
    first: Option<Box<dyn ChunkSource<T>>>,
    second: Box<dyn ChunkSource<T>>,
}

impl<T: Send + 'static> ChunkSource<T> for ChainChunks<T> {
    fn next_chunk(
        &mut self,
        size: usize,
        ctx: &mut DriveContext,
    ) -> Result<Option<Box<dyn ChunkTask<T>>>> {
        if let Some(first) = self.first.as_mut() {
            if let Some(task) = first.next_chunk(size, ctx)? {
                return Ok(Some(task));
            }
            self.first = None;
        }
        self.second.next_chunk(size, ctx)
    }
}
