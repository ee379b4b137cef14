//! Terminal sinks.
//!
//! Every terminal operation on a [`Pipeline`](crate::pipeline::Pipeline) is a
//! sink from this module plus a result extractor. The sinks are public so that
//! callers can drive a pipeline into them directly with
//! [`Pipeline::drive_into`](crate::pipeline::Pipeline::drive_into).

use std::marker::PhantomData;

use crate::collectors::Collector;
use crate::core::{Error, Result, Sink};
use crate::optional::OptionalResult;

/// Calls an action on every element
pub struct ForEachSink<T, F> {
    action: F,
    _phantom: PhantomData<fn(T)>,
}

impl<T, F: FnMut(T)> ForEachSink<T, F> {
    pub fn new(action: F) -> Self {
        Self {
            action,
            _phantom: PhantomData,
        }
    }
}

impl<T, F: FnMut(T)> Sink for ForEachSink<T, F> {
    type Item = T;

    fn accept(&mut self, item: T) -> Result<()> {
        (self.action)(item);
        Ok(())
    }
}

/// Counts elements without keeping them
pub struct CountSink<T> {
    count: u64,
    _phantom: PhantomData<fn(T)>,
}

impl<T> CountSink<T> {
    pub fn new() -> Self {
        Self {
            count: 0,
            _phantom: PhantomData,
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

impl<T> Default for CountSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Sink for CountSink<T> {
    type Item = T;

    fn accept(&mut self, _item: T) -> Result<()> {
        self.count += 1;
        Ok(())
    }
}

/// Folds elements with `acc = op(acc, element)`.
///
/// Unseeded, the first element becomes the accumulator and an empty drive
/// yields `Absent`. Seeded with an identity, the result is always present.
pub struct ReduceSink<T, F> {
    acc: Option<T>,
    op: F,
}

impl<T, F: FnMut(T, T) -> T> ReduceSink<T, F> {
    pub fn new(op: F) -> Self {
        Self { acc: None, op }
    }

    pub fn seeded(identity: T, op: F) -> Self {
        Self {
            acc: Some(identity),
            op,
        }
    }

    pub fn into_result(self) -> OptionalResult<T> {
        self.acc.into()
    }
}

impl<T, F: FnMut(T, T) -> T> Sink for ReduceSink<T, F> {
    type Item = T;

    fn accept(&mut self, item: T) -> Result<()> {
        let next = match self.acc.take() {
            Some(acc) => (self.op)(acc, item),
            None => item,
        };
        self.acc = Some(next);
        Ok(())
    }
}

/// Evaluates a predicate and stops once the outcome is known.
///
/// The sink stops at the first element whose predicate result equals
/// `stop_on`. `any_match` stops on `true`, `all_match` on `false`,
/// `none_match` on `true`.
pub struct MatchSink<T, P> {
    predicate: P,
    stop_on: bool,
    stopped: bool,
    _phantom: PhantomData<fn(T)>,
}

impl<T, P: FnMut(&T) -> bool> MatchSink<T, P> {
    pub fn any(predicate: P) -> Self {
        Self::stopping_on(predicate, true)
    }

    pub fn all(predicate: P) -> Self {
        Self::stopping_on(predicate, false)
    }

    pub fn none(predicate: P) -> Self {
        Self::stopping_on(predicate, true)
    }

    fn stopping_on(predicate: P, stop_on: bool) -> Self {
        Self {
            predicate,
            stop_on,
            stopped: false,
            _phantom: PhantomData,
        }
    }

    /// Whether a deciding element was seen
    pub fn decided(&self) -> bool {
        self.stopped
    }
}

impl<T, P: FnMut(&T) -> bool> Sink for MatchSink<T, P> {
    type Item = T;

    fn accept(&mut self, item: T) -> Result<()> {
        if !self.stopped && (self.predicate)(&item) == self.stop_on {
            self.stopped = true;
        }
        Ok(())
    }

    fn should_stop(&self) -> bool {
        self.stopped
    }
}

/// Keeps the first element and stops
pub struct FindSink<T> {
    found: Option<T>,
}

impl<T> FindSink<T> {
    pub fn new() -> Self {
        Self { found: None }
    }

    pub fn into_result(self) -> OptionalResult<T> {
        self.found.into()
    }
}

impl<T> Default for FindSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Sink for FindSink<T> {
    type Item = T;

    fn accept(&mut self, item: T) -> Result<()> {
        if self.found.is_none() {
            self.found = Some(item);
        }
        Ok(())
    }

    fn should_stop(&self) -> bool {
        self.found.is_some()
    }
}

enum CollectState<A, R> {
    Created,
    Accumulating(A),
    Finished(Option<R>),
}

/// Drives a [`Collector`] through `Created -> Accumulating -> Finished`.
///
/// The container is created on the first element, or at finish when nothing
/// arrived. Finishing happens exactly once; accepting or finishing again
/// fails with [`Error::CollectorFinished`].
pub struct CollectorSink<'c, T, C: Collector<T>> {
    collector: &'c C,
    state: CollectState<C::Container, C::Output>,
}

impl<'c, T, C: Collector<T>> CollectorSink<'c, T, C> {
    pub fn new(collector: &'c C) -> Self {
        Self {
            collector,
            state: CollectState::Created,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, CollectState::Finished(_))
    }

    /// The collector's result, finishing first if the drive has not.
    pub fn into_output(mut self) -> Result<C::Output> {
        if !self.is_finished() {
            self.finish()?;
        }
        match self.state {
            CollectState::Finished(Some(output)) => Ok(output),
            _ => Err(Error::CollectorFinished),
        }
    }
}

impl<T, C: Collector<T>> Sink for CollectorSink<'_, T, C> {
    type Item = T;

    fn accept(&mut self, item: T) -> Result<()> {
        match &mut self.state {
            CollectState::Accumulating(container) => self.collector.accumulate(container, item),
            CollectState::Created => {
                let mut container = self.collector.create_container();
                self.collector.accumulate(&mut container, item)?;
                self.state = CollectState::Accumulating(container);
                Ok(())
            }
            CollectState::Finished(_) => Err(Error::CollectorFinished),
        }
    }

    fn finish(&mut self) -> Result<()> {
        let container = match std::mem::replace(&mut self.state, CollectState::Finished(None)) {
            CollectState::Created => self.collector.create_container(),
            CollectState::Accumulating(container) => container,
            finished @ CollectState::Finished(_) => {
                self.state = finished;
                return Err(Error::CollectorFinished);
            }
        };
        self.state = CollectState::Finished(Some(self.collector.finish(container)));
        Ok(())
    }
}

/// Accumulates into a bare container and never finishes it.
///
/// Used for parallel chunks, whose containers are combined before the single
/// finish.
pub(crate) struct ContainerSink<'c, T, C: Collector<T>> {
    collector: &'c C,
    container: C::Container,
}

impl<'c, T, C: Collector<T>> ContainerSink<'c, T, C> {
    pub(crate) fn new(collector: &'c C) -> Self {
        Self {
            collector,
            container: collector.create_container(),
        }
    }

    pub(crate) fn into_container(self) -> C::Container {
        self.container
    }
}

impl<T, C: Collector<T>> Sink for ContainerSink<'_, T, C> {
    type Item = T;

    fn accept(&mut self, item: T) -> Result<()> {
        self.collector.accumulate(&mut self.container, item)
    }
}
