//! Stage implementations for the streamfuse library.
//!
//! Each stage is an immutable descriptor. When a pipeline is driven, every
//! stage wraps the sink downstream of it in a fresh sink that holds whatever
//! per-drive state the operation needs (a sort buffer, a seen-set, a counter).

use std::cmp::Ordering;
use std::collections::HashSet;
use std::hash::Hash;
use std::marker::PhantomData;

use crate::core::{Result, Sink, Stage, StageKind};

/// A stage that keeps only elements matching a predicate.
pub struct FilterStage<T, F> {
    predicate: F,
    _phantom: PhantomData<fn(T) -> T>,
}

impl<T, F> FilterStage<T, F> {
    /// Create a new filter stage
    pub fn new(predicate: F) -> Self {
        Self {
            predicate,
            _phantom: PhantomData,
        }
    }
}

struct FilterSink<'a, T, F> {
    predicate: &'a F,
    downstream: &'a mut dyn Sink<Item = T>,
}

impl<T, F> Sink for FilterSink<'_, T, F>
where
    F: Fn(&T) -> bool,
{
    type Item = T;

    fn accept(&mut self, item: T) -> Result<()> {
        if (self.predicate)(&item) {
            self.downstream.accept(item)
        } else {
            Ok(())
        }
    }

    fn should_stop(&self) -> bool {
        self.downstream.should_stop()
    }

    fn finish(&mut self) -> Result<()> {
        self.downstream.finish()
    }
}

impl<T, F> Stage for FilterStage<T, F>
where
    T: 'static,
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    type Input = T;
    type Output = T;

    fn kind(&self) -> StageKind {
        StageKind::Filter
    }

    fn wrap<'a>(
        &'a self,
        downstream: &'a mut dyn Sink<Item = T>,
    ) -> Box<dyn Sink<Item = T> + 'a> {
        Box::new(FilterSink {
            predicate: &self.predicate,
            downstream,
        })
    }
}

/// A stage that transforms every element.
pub struct MapStage<T, U, F> {
    f: F,
    _phantom: PhantomData<fn(T) -> U>,
}

impl<T, U, F> MapStage<T, U, F> {
    /// Create a new map stage
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: PhantomData,
        }
    }
}

struct MapSink<'a, T, U, F> {
    f: &'a F,
    downstream: &'a mut dyn Sink<Item = U>,
    _phantom: PhantomData<fn(T)>,
}

impl<T, U, F> Sink for MapSink<'_, T, U, F>
where
    F: Fn(T) -> U,
{
    type Item = T;

    fn accept(&mut self, item: T) -> Result<()> {
        self.downstream.accept((self.f)(item))
    }

    fn should_stop(&self) -> bool {
        self.downstream.should_stop()
    }

    fn finish(&mut self) -> Result<()> {
        self.downstream.finish()
    }
}

impl<T, U, F> Stage for MapStage<T, U, F>
where
    T: 'static,
    U: 'static,
    F: Fn(T) -> U + Send + Sync + 'static,
{
    type Input = T;
    type Output = U;

    fn kind(&self) -> StageKind {
        StageKind::Map
    }

    fn wrap<'a>(
        &'a self,
        downstream: &'a mut dyn Sink<Item = U>,
    ) -> Box<dyn Sink<Item = T> + 'a> {
        Box::new(MapSink {
            f: &self.f,
            downstream,
            _phantom: PhantomData,
        })
    }
}

/// A stage that replaces every element with a sub-sequence.
pub struct FlatMapStage<T, I, F> {
    f: F,
    _phantom: PhantomData<fn(T) -> I>,
}

impl<T, I, F> FlatMapStage<T, I, F> {
    /// Create a new flat-map stage
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: PhantomData,
        }
    }
}

struct FlatMapSink<'a, T, I: IntoIterator, F> {
    f: &'a F,
    downstream: &'a mut dyn Sink<Item = I::Item>,
    _phantom: PhantomData<fn(T) -> I>,
}

impl<T, I, F> Sink for FlatMapSink<'_, T, I, F>
where
    I: IntoIterator,
    F: Fn(T) -> I,
{
    type Item = T;

    fn accept(&mut self, item: T) -> Result<()> {
        for inner in (self.f)(item) {
            // a short-circuiting downstream must not see the rest of the sub-sequence
            if self.downstream.should_stop() {
                break;
            }
            self.downstream.accept(inner)?;
        }
        Ok(())
    }

    fn should_stop(&self) -> bool {
        self.downstream.should_stop()
    }

    fn finish(&mut self) -> Result<()> {
        self.downstream.finish()
    }
}

impl<T, I, F> Stage for FlatMapStage<T, I, F>
where
    T: 'static,
    I: IntoIterator + 'static,
    I::Item: 'static,
    F: Fn(T) -> I + Send + Sync + 'static,
{
    type Input = T;
    type Output = I::Item;

    fn kind(&self) -> StageKind {
        StageKind::FlatMap
    }

    fn wrap<'a>(
        &'a self,
        downstream: &'a mut dyn Sink<Item = I::Item>,
    ) -> Box<dyn Sink<Item = T> + 'a> {
        Box::new(FlatMapSink {
            f: &self.f,
            downstream,
            _phantom: PhantomData,
        })
    }
}

/// A stage that observes every element without changing it.
pub struct PeekStage<T, F> {
    observer: F,
    _phantom: PhantomData<fn(T) -> T>,
}

impl<T, F> PeekStage<T, F> {
    /// Create a new peek stage
    pub fn new(observer: F) -> Self {
        Self {
            observer,
            _phantom: PhantomData,
        }
    }
}

struct PeekSink<'a, T, F> {
    observer: &'a F,
    downstream: &'a mut dyn Sink<Item = T>,
}

impl<T, F> Sink for PeekSink<'_, T, F>
where
    F: Fn(&T),
{
    type Item = T;

    fn accept(&mut self, item: T) -> Result<()> {
        (self.observer)(&item);
        self.downstream.accept(item)
    }

    fn should_stop(&self) -> bool {
        self.downstream.should_stop()
    }

    fn finish(&mut self) -> Result<()> {
        self.downstream.finish()
    }
}

impl<T, F> Stage for PeekStage<T, F>
where
    T: 'static,
    F: Fn(&T) + Send + Sync + 'static,
{
    type Input = T;
    type Output = T;

    fn kind(&self) -> StageKind {
        StageKind::Peek
    }

    fn wrap<'a>(
        &'a self,
        downstream: &'a mut dyn Sink<Item = T>,
    ) -> Box<dyn Sink<Item = T> + 'a> {
        Box::new(PeekSink {
            observer: &self.observer,
            downstream,
        })
    }
}

/// A stage that forwards only the first element for every distinct key.
///
/// Encounter order is preserved. The seen-set grows with the number of
/// distinct keys and lives only for the duration of one drive.
pub struct DistinctStage<T, K, F> {
    key: F,
    _phantom: PhantomData<fn(T) -> K>,
}

impl<T, K, F> DistinctStage<T, K, F> {
    /// Create a distinct stage keyed by `key`
    pub fn new(key: F) -> Self {
        Self {
            key,
            _phantom: PhantomData,
        }
    }
}

struct DistinctSink<'a, T, K, F> {
    key: &'a F,
    seen: HashSet<K>,
    downstream: &'a mut dyn Sink<Item = T>,
}

impl<T, K, F> Sink for DistinctSink<'_, T, K, F>
where
    K: Hash + Eq,
    F: Fn(&T) -> K,
{
    type Item = T;

    fn accept(&mut self, item: T) -> Result<()> {
        if self.seen.insert((self.key)(&item)) {
            self.downstream.accept(item)
        } else {
            Ok(())
        }
    }

    fn should_stop(&self) -> bool {
        self.downstream.should_stop()
    }

    fn finish(&mut self) -> Result<()> {
        self.downstream.finish()
    }
}

impl<T, K, F> Stage for DistinctStage<T, K, F>
where
    T: 'static,
    K: Hash + Eq + 'static,
    F: Fn(&T) -> K + Send + Sync + 'static,
{
    type Input = T;
    type Output = T;

    fn kind(&self) -> StageKind {
        StageKind::Distinct
    }

    fn wrap<'a>(
        &'a self,
        downstream: &'a mut dyn Sink<Item = T>,
    ) -> Box<dyn Sink<Item = T> + 'a> {
        Box::new(DistinctSink {
            key: &self.key,
            seen: HashSet::new(),
            downstream,
        })
    }
}

/// A stage that buffers everything, then emits in comparator order.
///
/// The sort is stable: elements comparing equal keep their encounter order.
pub struct SortedStage<T, C> {
    compare: C,
    _phantom: PhantomData<fn(T) -> T>,
}

impl<T, C> SortedStage<T, C> {
    /// Create a sorted stage ordered by `compare`
    pub fn new(compare: C) -> Self {
        Self {
            compare,
            _phantom: PhantomData,
        }
    }
}

struct SortedSink<'a, T, C> {
    compare: &'a C,
    buffer: Vec<T>,
    downstream: &'a mut dyn Sink<Item = T>,
}

impl<T, C> Sink for SortedSink<'_, T, C>
where
    C: Fn(&T, &T) -> Ordering,
{
    type Item = T;

    fn accept(&mut self, item: T) -> Result<()> {
        self.buffer.push(item);
        Ok(())
    }

    // Buffering is pointless once downstream has stopped.
    fn should_stop(&self) -> bool {
        self.downstream.should_stop()
    }

    fn finish(&mut self) -> Result<()> {
        let compare = self.compare;
        let mut buffer = std::mem::take(&mut self.buffer);
        buffer.sort_by(|a, b| compare(a, b));

        for item in buffer {
            if self.downstream.should_stop() {
                break;
            }
            self.downstream.accept(item)?;
        }
        self.downstream.finish()
    }
}

impl<T, C> Stage for SortedStage<T, C>
where
    T: 'static,
    C: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
{
    type Input = T;
    type Output = T;

    fn kind(&self) -> StageKind {
        StageKind::Sorted
    }

    fn wrap<'a>(
        &'a self,
        downstream: &'a mut dyn Sink<Item = T>,
    ) -> Box<dyn Sink<Item = T> + 'a> {
        Box::new(SortedSink {
            compare: &self.compare,
            buffer: Vec::new(),
            downstream,
        })
    }
}

/// A stage that forwards at most `limit` elements, then stops the drive.
pub struct LimitStage<T> {
    limit: usize,
    _phantom: PhantomData<fn(T) -> T>,
}

impl<T> LimitStage<T> {
    /// Create a new limit stage
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            _phantom: PhantomData,
        }
    }
}

struct LimitSink<'a, T> {
    remaining: usize,
    downstream: &'a mut dyn Sink<Item = T>,
}

impl<T> Sink for LimitSink<'_, T> {
    type Item = T;

    fn accept(&mut self, item: T) -> Result<()> {
        if self.remaining == 0 {
            return Ok(());
        }
        self.remaining -= 1;
        self.downstream.accept(item)
    }

    fn should_stop(&self) -> bool {
        self.remaining == 0 || self.downstream.should_stop()
    }

    fn finish(&mut self) -> Result<()> {
        self.downstream.finish()
    }
}

impl<T: 'static> Stage for LimitStage<T> {
    type Input = T;
    type Output = T;

    fn kind(&self) -> StageKind {
        StageKind::Limit
    }

    fn wrap<'a>(
        &'a self,
        downstream: &'a mut dyn Sink<Item = T>,
    ) -> Box<dyn Sink<Item = T> + 'a> {
        Box::new(LimitSink {
            remaining: self.limit,
            downstream,
        })
    }
}

/// A stage that discards the first `skip` elements.
pub struct SkipStage<T> {
    skip: usize,
    _phantom: PhantomData<fn(T) -> T>,
}

impl<T> SkipStage<T> {
    /// Create a new skip stage
    pub fn new(skip: usize) -> Self {
        Self {
            skip,
            _phantom: PhantomData,
        }
    }
}

struct SkipSink<'a, T> {
    to_skip: usize,
    downstream: &'a mut dyn Sink<Item = T>,
}

impl<T> Sink for SkipSink<'_, T> {
    type Item = T;

    fn accept(&mut self, item: T) -> Result<()> {
        if self.to_skip > 0 {
            self.to_skip -= 1;
            return Ok(());
        }
        self.downstream.accept(item)
    }

    fn should_stop(&self) -> bool {
        self.downstream.should_stop()
    }

    fn finish(&mut self) -> Result<()> {
        self.downstream.finish()
    }
}

impl<T: 'static> Stage for SkipStage<T> {
    type Input = T;
    type Output = T;

    fn kind(&self) -> StageKind {
        StageKind::Skip
    }

    fn wrap<'a>(
        &'a self,
        downstream: &'a mut dyn Sink<Item = T>,
    ) -> Box<dyn Sink<Item = T> + 'a> {
        Box::new(SkipSink {
            to_skip: self.skip,
            downstream,
        })
    }
}

/// A stage that forwards elements while a predicate holds, then stops.
pub struct TakeWhileStage<T, F> {
    predicate: F,
    _phantom: PhantomData<fn(T) -> T>,
}

impl<T, F> TakeWhileStage<T, F> {
    pub fn new(predicate: F) -> Self {
        Self {
            predicate,
            _phantom: PhantomData,
        }
    }
}

struct TakeWhileSink<'a, T, F> {
    predicate: &'a F,
    done: bool,
    downstream: &'a mut dyn Sink<Item = T>,
}

impl<T, F> Sink for TakeWhileSink<'_, T, F>
where
    F: Fn(&T) -> bool,
{
    type Item = T;

    fn accept(&mut self, item: T) -> Result<()> {
        if self.done {
            return Ok(());
        }
        if (self.predicate)(&item) {
            self.downstream.accept(item)
        } else {
            self.done = true;
            Ok(())
        }
    }

    fn should_stop(&self) -> bool {
        self.done || self.downstream.should_stop()
    }

    fn finish(&mut self) -> Result<()> {
        self.downstream.finish()
    }
}

impl<T, F> Stage for TakeWhileStage<T, F>
where
    T: 'static,
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    type Input = T;
    type Output = T;

    fn kind(&self) -> StageKind {
        StageKind::TakeWhile
    }

    fn wrap<'a>(
        &'a self,
        downstream: &'a mut dyn Sink<Item = T>,
    ) -> Box<dyn Sink<Item = T> + 'a> {
        Box::new(TakeWhileSink {
            predicate: &self.predicate,
            done: false,
            downstream,
        })
    }
}

/// A stage that discards elements while a predicate holds, then forwards the rest.
pub struct DropWhileStage<T, F> {
    predicate: F,
    _phantom: PhantomData<fn(T) -> T>,
}

impl<T, F> DropWhileStage<T, F> {
    pub fn new(predicate: F) -> Self {
        Self {
            predicate,
            _phantom: PhantomData,
        }
    }
}

struct DropWhileSink<'a, T, F> {
    predicate: &'a F,
    dropping: bool,
    downstream: &'a mut dyn Sink<Item = T>,
}

impl<T, F> Sink for DropWhileSink<'_, T, F>
where
    F: Fn(&T) -> bool,
{
    type Item = T;

    fn accept(&mut self, item: T) -> Result<()> {
        if self.dropping {
            if (self.predicate)(&item) {
                return Ok(());
            }
            self.dropping = false;
        }
        self.downstream.accept(item)
    }

    fn should_stop(&self) -> bool {
        self.downstream.should_stop()
    }

    fn finish(&mut self) -> Result<()> {
        self.downstream.finish()
    }
}

impl<T, F> Stage for DropWhileStage<T, F>
where
    T: 'static,
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    type Input = T;
    type Output = T;

    fn kind(&self) -> StageKind {
        StageKind::DropWhile
    }

    fn wrap<'a>(
        &'a self,
        downstream: &'a mut dyn Sink<Item = T>,
    ) -> Box<dyn Sink<Item = T> + 'a> {
        Box::new(DropWhileSink {
            predicate: &self.predicate,
            dropping: true,
            downstream,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records everything it receives and optionally stops after `cap` items.
    struct Recorder {
        items: Vec<i32>,
        cap: Option<usize>,
        finished: usize,
    }

    impl Recorder {
        fn new() -> Self {
            Self {
                items: Vec::new(),
                cap: None,
                finished: 0,
            }
        }

        fn capped(cap: usize) -> Self {
            Self {
                cap: Some(cap),
                ..Self::new()
            }
        }
    }

    impl Sink for Recorder {
        type Item = i32;

        fn accept(&mut self, item: i32) -> Result<()> {
            self.items.push(item);
            Ok(())
        }

        fn should_stop(&self) -> bool {
            self.cap.is_some_and(|cap| self.items.len() >= cap)
        }

        fn finish(&mut self) -> Result<()> {
            self.finished += 1;
            Ok(())
        }
    }

    fn run<S: Stage<Input = i32, Output = i32>>(stage: &S, input: &[i32], out: &mut Recorder) {
        let mut sink = stage.wrap(out);
        for &item in input {
            if sink.should_stop() {
                break;
            }
            sink.accept(item).unwrap();
        }
        sink.finish().unwrap();
    }

    #[test]
    fn test_filter_stage() {
        let stage = FilterStage::new(|x: &i32| x % 2 == 0);
        let mut out = Recorder::new();
        run(&stage, &[1, 2, 3, 4], &mut out);
        assert_eq!(out.items, vec![2, 4]);
        assert_eq!(out.finished, 1);
        assert_eq!(stage.kind(), StageKind::Filter);
    }

    #[test]
    fn test_map_stage_changes_type() {
        let stage = MapStage::new(|x: i32| x.to_string());
        struct Strings(Vec<String>);
        impl Sink for Strings {
            type Item = String;
            fn accept(&mut self, item: String) -> Result<()> {
                self.0.push(item);
                Ok(())
            }
        }
        let mut out = Strings(Vec::new());
        {
            let mut sink = stage.wrap(&mut out);
            sink.accept(4).unwrap();
            sink.accept(2).unwrap();
        }
        assert_eq!(out.0, vec!["4", "2"]);
    }

    #[test]
    fn test_flat_map_respects_downstream_stop() {
        let stage = FlatMapStage::new(|x: i32| vec![x; 3]);
        let mut out = Recorder::capped(4);
        run(&stage, &[1, 2, 3], &mut out);
        assert_eq!(out.items, vec![1, 1, 1, 2]);
    }

    #[test]
    fn test_distinct_keeps_first_occurrence() {
        let stage = DistinctStage::new(|x: &i32| x.abs());
        let mut out = Recorder::new();
        run(&stage, &[3, -3, 1, 3, -1, 2], &mut out);
        assert_eq!(out.items, vec![3, 1, 2]);
    }

    #[test]
    fn test_sorted_is_stable() {
        // sort by tens digit only; units digits record the encounter order
        let stage = SortedStage::new(|a: &i32, b: &i32| (a / 10).cmp(&(b / 10)));
        let mut out = Recorder::new();
        run(&stage, &[31, 12, 33, 11, 32, 13], &mut out);
        assert_eq!(out.items, vec![12, 11, 13, 31, 33, 32]);
        assert_eq!(out.finished, 1);
    }

    #[test]
    fn test_sorted_emits_only_what_downstream_wants() {
        let stage = SortedStage::new(|a: &i32, b: &i32| b.cmp(a));
        let mut out = Recorder::capped(2);
        run(&stage, &[5, 9, 1, 7], &mut out);
        assert_eq!(out.items, vec![9, 7]);
    }

    #[test]
    fn test_sorted_stops_with_stopped_downstream() {
        let stage = SortedStage::new(|a: &i32, b: &i32| a.cmp(b));
        let mut out = Recorder::capped(0);
        let sink = stage.wrap(&mut out);
        assert!(sink.should_stop());
    }

    #[test]
    fn test_limit_stops() {
        let stage = LimitStage::new(2);
        let mut out = Recorder::new();
        let mut sink = stage.wrap(&mut out);
        assert!(!sink.should_stop());
        sink.accept(1).unwrap();
        sink.accept(2).unwrap();
        assert!(sink.should_stop());
        sink.accept(3).unwrap();
        drop(sink);
        assert_eq!(out.items, vec![1, 2]);
    }

    #[test]
    fn test_limit_zero_stops_immediately() {
        let stage = LimitStage::<i32>::new(0);
        let mut out = Recorder::new();
        let sink = stage.wrap(&mut out);
        assert!(sink.should_stop());
    }

    #[test]
    fn test_skip_stage() {
        let stage = SkipStage::new(2);
        let mut out = Recorder::new();
        run(&stage, &[1, 2, 3, 4], &mut out);
        assert_eq!(out.items, vec![3, 4]);
    }

    #[test]
    fn test_take_while_and_drop_while() {
        let take = TakeWhileStage::new(|x: &i32| *x < 3);
        let mut out = Recorder::new();
        run(&take, &[1, 2, 3, 1, 2], &mut out);
        assert_eq!(out.items, vec![1, 2]);

        let skip = DropWhileStage::new(|x: &i32| *x < 3);
        let mut out = Recorder::new();
        run(&skip, &[1, 2, 3, 1, 2], &mut out);
        assert_eq!(out.items, vec![3, 1, 2]);
    }

    #[test]
    fn test_peek_sees_every_forwarded_element() {
        use std::sync::atomic::{AtomicI32, Ordering as AtomicOrdering};
        let seen = std::sync::Arc::new(AtomicI32::new(0));
        let observer = seen.clone();
        let stage = PeekStage::new(move |x: &i32| {
            observer.fetch_add(*x, AtomicOrdering::SeqCst);
        });
        let mut out = Recorder::new();
        run(&stage, &[1, 2, 3], &mut out);
        assert_eq!(seen.load(AtomicOrdering::SeqCst), 6);
        assert_eq!(out.items, vec![1, 2, 3]);
    }
}
