//! Pipeline assembly and driving.
//!
//! A [`Pipeline`] is built lazily: appending a stage only records a
//! descriptor. A terminal operation composes one sink out of all stages and
//! pulls the producer through it in a single pass.

mod link;
mod parallel;

use std::cmp::Ordering;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::collectors::{to_list, Collector};
use crate::core::{Producer, Result, Sink, Stage, StageKind};
use crate::optional::OptionalResult;
use crate::producers::{EmptyProducer, IterProducer, VecProducer};
use crate::stages::{
    DistinctStage, DropWhileStage, FilterStage, FlatMapStage, LimitStage, MapStage, PeekStage,
    SkipStage, SortedStage, TakeWhileStage,
};
use crate::terminal::{CollectorSink, CountSink, FindSink, ForEachSink, MatchSink, ReduceSink};

use link::{ChainLink, DriveContext, Link, SourceLink, StageLink};

/// Configuration for driving a pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Elements per chunk in a parallel collect
    pub chunk_size: usize,
    /// Maximum number of chunks processed at once in a parallel collect;
    /// 0 uses the available parallelism of the machine
    pub max_concurrency: usize,
    /// Bound of the channel behind [`Pipeline::into_stream`]
    pub channel_capacity: usize,
    /// Token checked before every pull
    pub cancellation: Option<CancellationToken>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            max_concurrency: 0,
            channel_capacity: 64,
            cancellation: None,
        }
    }
}

impl PipelineConfig {
    /// The resolved number of chunks a parallel collect may run at once
    pub fn concurrency(&self) -> usize {
        match self.max_concurrency {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n => n,
        }
    }
}

/// A lazy, single-pass chain of a producer and zero or more stages.
///
/// Every intermediate operation returns a new pipeline sharing the links
/// built so far, so a common prefix can be cloned and extended in different
/// directions. The producer itself is shared too: only one drive across all
/// pipelines built from the same root succeeds, any other fails with
/// [`Error::ConsumedPipeline`](crate::error::Error::ConsumedPipeline).
///
/// # Examples
///
/// ```rust
/// use streamfuse::prelude::*;
///
/// # fn main() -> Result<()> {
/// let squares = Pipeline::of(vec![1, 2, 3, 4, 5])
///     .filter(|x| x % 2 == 1)
///     .map(|x| x * x)
///     .to_vec()?;
/// assert_eq!(squares, vec![1, 9, 25]);
/// # Ok(())
/// # }
/// ```
pub struct Pipeline<T> {
    link: Arc<dyn Link<T>>,
    config: PipelineConfig,
}

impl<T> Clone for Pipeline<T> {
    fn clone(&self) -> Self {
        Self {
            link: Arc::clone(&self.link),
            config: self.config.clone(),
        }
    }
}

impl<T> fmt::Debug for Pipeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_kinds())
            .field("config", &self.config)
            .finish()
    }
}

impl<T> Pipeline<T> {
    /// The stage kinds from source to end
    pub fn stage_kinds(&self) -> Vec<StageKind> {
        let mut kinds = Vec::new();
        self.link.stages(&mut kinds);
        kinds
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Set the chunk size used by [`Pipeline::collect_parallel`]
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size.max(1);
        self
    }

    /// Set the maximum number of chunks collected at once; 0 picks the
    /// available parallelism when the collect starts
    pub fn max_concurrency(mut self, max: usize) -> Self {
        self.config.max_concurrency = max;
        self
    }

    /// Set the channel bound used by [`Pipeline::into_stream`]
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity.max(1);
        self
    }

    /// Fail the drive with `Cancelled` once `token` is cancelled
    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.config.cancellation = Some(token);
        self
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }
}

impl<T: Send + 'static> Pipeline<T> {
    /// Build a pipeline rooted at `producer`
    pub fn from_producer<P>(producer: P) -> Self
    where
        P: Producer<Item = T> + Send + 'static,
    {
        Self {
            link: Arc::new(SourceLink::new(producer)),
            config: PipelineConfig::default(),
        }
    }

    /// Build a pipeline over the items of a vector
    pub fn of(items: Vec<T>) -> Self {
        Self::from_producer(VecProducer::new(items))
    }

    /// Build a pipeline that pulls lazily from an iterator, which may be infinite
    pub fn from_iterator<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        Self::from_producer(IterProducer::new(iter))
    }

    pub fn empty() -> Self {
        Self::from_producer(EmptyProducer::default())
    }

    /// Append a stage. All built-in intermediate operations go through here.
    pub fn stage<S>(self, stage: S) -> Pipeline<S::Output>
    where
        S: Stage<Input = T>,
        S::Output: Send + 'static,
    {
        Pipeline {
            link: Arc::new(StageLink::new(stage, self.link)),
            config: self.config,
        }
    }

    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.stage(FilterStage::new(predicate))
    }

    pub fn map<U, F>(self, f: F) -> Pipeline<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        self.stage(MapStage::new(f))
    }

    /// Replace every element with the elements of `f(element)`
    pub fn flat_map<I, F>(self, f: F) -> Pipeline<I::Item>
    where
        I: IntoIterator + 'static,
        I::Item: Send + 'static,
        F: Fn(T) -> I + Send + Sync + 'static,
    {
        self.stage(FlatMapStage::new(f))
    }

    /// Observe every element as it passes
    pub fn peek<F>(self, observer: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.stage(PeekStage::new(observer))
    }

    /// Forward only the first occurrence of every element
    pub fn distinct(self) -> Self
    where
        T: Hash + Eq + Clone,
    {
        self.stage(DistinctStage::new(|item: &T| item.clone()))
    }

    /// Forward only the first element for every distinct key
    pub fn distinct_by<K, F>(self, key: F) -> Self
    where
        K: Hash + Eq + 'static,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        self.stage(DistinctStage::new(key))
    }

    /// Sort in natural order. Buffers the whole upstream.
    pub fn sorted(self) -> Self
    where
        T: Ord,
    {
        self.stage(SortedStage::new(|a: &T, b: &T| a.cmp(b)))
    }

    /// Stable sort by `compare`. Buffers the whole upstream.
    pub fn sorted_by<C>(self, compare: C) -> Self
    where
        C: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        self.stage(SortedStage::new(compare))
    }

    pub fn sorted_by_key<K, F>(self, key: F) -> Self
    where
        K: Ord + 'static,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        self.stage(SortedStage::new(move |a: &T, b: &T| key(a).cmp(&key(b))))
    }

    /// Forward at most `n` elements, then stop pulling
    pub fn limit(self, n: usize) -> Self {
        self.stage(LimitStage::new(n))
    }

    /// Discard the first `n` elements
    pub fn skip(self, n: usize) -> Self {
        self.stage(SkipStage::new(n))
    }

    /// Forward elements until `predicate` first fails, then stop pulling
    pub fn take_while<F>(self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.stage(TakeWhileStage::new(predicate))
    }

    /// Discard elements until `predicate` first fails
    pub fn drop_while<F>(self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.stage(DropWhileStage::new(predicate))
    }

    /// Everything from this pipeline followed by everything from `other`.
    ///
    /// Driving the result consumes both.
    pub fn chain(self, other: Pipeline<T>) -> Self {
        Pipeline {
            link: Arc::new(ChainLink::new(self.link, other.link)),
            config: self.config,
        }
    }

    /// Drive the pipeline into a caller-provided sink.
    pub fn drive_into<S: Sink<Item = T>>(self, sink: &mut S) -> Result<()> {
        drive_link(&*self.link, &self.config, sink)
    }

    pub fn for_each<F: FnMut(T)>(self, action: F) -> Result<()> {
        self.drive_into(&mut ForEachSink::new(action))
    }

    pub fn count(self) -> Result<u64> {
        let mut sink = CountSink::new();
        self.drive_into(&mut sink)?;
        Ok(sink.count())
    }

    /// Fold with the first element as seed; `Absent` when empty.
    pub fn reduce<F: FnMut(T, T) -> T>(self, op: F) -> Result<OptionalResult<T>> {
        let mut sink = ReduceSink::new(op);
        self.drive_into(&mut sink)?;
        Ok(sink.into_result())
    }

    /// Fold from `identity`; `identity` itself when empty.
    pub fn reduce_with<F: FnMut(T, T) -> T>(self, identity: T, op: F) -> Result<T> {
        let mut sink = ReduceSink::seeded(identity, op);
        self.drive_into(&mut sink)?;
        sink.into_result().into_value()
    }

    /// The smallest element by `compare`; the first one on ties.
    pub fn min_by<C>(self, mut compare: C) -> Result<OptionalResult<T>>
    where
        C: FnMut(&T, &T) -> Ordering,
    {
        self.reduce(move |acc, item| {
            if compare(&acc, &item) == Ordering::Greater {
                item
            } else {
                acc
            }
        })
    }

    /// The largest element by `compare`; the first one on ties.
    pub fn max_by<C>(self, mut compare: C) -> Result<OptionalResult<T>>
    where
        C: FnMut(&T, &T) -> Ordering,
    {
        self.reduce(move |acc, item| {
            if compare(&item, &acc) == Ordering::Greater {
                item
            } else {
                acc
            }
        })
    }

    pub fn min(self) -> Result<OptionalResult<T>>
    where
        T: Ord,
    {
        self.min_by(|a, b| a.cmp(b))
    }

    pub fn max(self) -> Result<OptionalResult<T>>
    where
        T: Ord,
    {
        self.max_by(|a, b| a.cmp(b))
    }

    /// Whether any element matches. Stops at the first match.
    pub fn any_match<P: FnMut(&T) -> bool>(self, predicate: P) -> Result<bool> {
        let mut sink = MatchSink::any(predicate);
        self.drive_into(&mut sink)?;
        Ok(sink.decided())
    }

    /// Whether every element matches. Stops at the first mismatch.
    pub fn all_match<P: FnMut(&T) -> bool>(self, predicate: P) -> Result<bool> {
        let mut sink = MatchSink::all(predicate);
        self.drive_into(&mut sink)?;
        Ok(!sink.decided())
    }

    /// Whether no element matches. Stops at the first match.
    pub fn none_match<P: FnMut(&T) -> bool>(self, predicate: P) -> Result<bool> {
        let mut sink = MatchSink::none(predicate);
        self.drive_into(&mut sink)?;
        Ok(!sink.decided())
    }

    /// The first element in encounter order.
    pub fn find_first(self) -> Result<OptionalResult<T>> {
        let mut sink = FindSink::new();
        self.drive_into(&mut sink)?;
        Ok(sink.into_result())
    }

    /// Some element of the pipeline.
    ///
    /// Sequential drives return the first element; callers must not rely on
    /// which element is returned.
    pub fn find_any(self) -> Result<OptionalResult<T>> {
        self.find_first()
    }

    /// Reduce the pipeline with `collector`.
    pub fn collect<C: Collector<T>>(self, collector: C) -> Result<C::Output> {
        self.collect_with(&collector)
    }

    pub fn to_vec(self) -> Result<Vec<T>> {
        self.collect(to_list())
    }

    fn collect_with<C: Collector<T>>(self, collector: &C) -> Result<C::Output> {
        let mut sink = CollectorSink::new(collector);
        self.drive_into(&mut sink)?;
        sink.into_output()
    }
}

impl<T: Send + 'static> From<Vec<T>> for Pipeline<T> {
    fn from(items: Vec<T>) -> Self {
        Self::of(items)
    }
}

/// Gathers the items eagerly; use [`Pipeline::from_iterator`] for lazy or
/// infinite sources.
impl<T: Send + 'static> FromIterator<T> for Pipeline<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::of(iter.into_iter().collect())
    }
}

fn drive_link<T>(
    link: &dyn Link<T>,
    config: &PipelineConfig,
    sink: &mut dyn Sink<Item = T>,
) -> Result<()> {
    #[cfg(feature = "tracing")]
    let _span = {
        let mut kinds = Vec::new();
        link.stages(&mut kinds);
        crate::tracing_support::drive_span(&kinds).entered()
    };

    let mut ctx = DriveContext::new(config.cancellation.clone());
    let result = link.drive(sink, &mut ctx);
    observe_drive(&ctx, &result);
    result
}

#[cfg_attr(
    not(any(feature = "tracing", feature = "metrics")),
    allow(unused_variables)
)]
fn observe_drive(ctx: &DriveContext, result: &Result<()>) {
    #[cfg(feature = "tracing")]
    crate::tracing_support::drive_finished(ctx.pulled, ctx.short_circuited, result);

    #[cfg(feature = "metrics")]
    crate::metrics::record_drive(ctx.pulled, ctx.short_circuited);
}
