//! Producer implementations for the streamfuse library.
//!
//! This module provides concrete producers that feed pipelines, plus the
//! [`SinglePass`] guard every pipeline root is wrapped in.

use std::collections::VecDeque;
use std::marker::PhantomData;
use std::ops::Range;

use crate::core::{Error, Producer, Result};

/// A producer that generates numbers from a range
pub struct RangeProducer {
    range: Range<i64>,
}

impl RangeProducer {
    /// Create a new range producer
    pub fn new(range: Range<i64>) -> Self {
        Self { range }
    }
}

impl Producer for RangeProducer {
    type Item = i64;

    fn produce(&mut self) -> Result<Option<Self::Item>> {
        Ok(self.range.next())
    }
}

/// A producer that yields items from a vector
pub struct VecProducer<T> {
    items: VecDeque<T>,
}

impl<T> VecProducer<T> {
    /// Create a new vector producer
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: items.into(),
        }
    }

    /// Check if the producer has more items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get the number of remaining items
    pub fn len(&self) -> usize {
        self.items.len()
    }
}

impl<T> Producer for VecProducer<T> {
    type Item = T;

    fn produce(&mut self) -> Result<Option<Self::Item>> {
        Ok(self.items.pop_front())
    }
}

/// A producer that pulls from any iterator
pub struct IterProducer<I> {
    iter: I,
}

impl<I: Iterator> IterProducer<I> {
    /// Create a new iterator producer
    pub fn new<It: IntoIterator<IntoIter = I>>(iter: It) -> Self {
        Self {
            iter: iter.into_iter(),
        }
    }
}

impl<I: Iterator> Producer for IterProducer<I> {
    type Item = I::Item;

    fn produce(&mut self) -> Result<Option<Self::Item>> {
        Ok(self.iter.next())
    }
}

/// A producer that repeats a single value
pub struct RepeatProducer<T> {
    value: T,
    remaining: Option<usize>,
}

impl<T: Clone> RepeatProducer<T> {
    /// Create a producer that repeats a value indefinitely
    pub fn new(value: T) -> Self {
        Self {
            value,
            remaining: None,
        }
    }

    /// Create a producer that repeats a value n times
    pub fn times(value: T, count: usize) -> Self {
        Self {
            value,
            remaining: Some(count),
        }
    }
}

impl<T: Clone> Producer for RepeatProducer<T> {
    type Item = T;

    fn produce(&mut self) -> Result<Option<Self::Item>> {
        if let Some(ref mut rem) = self.remaining {
            if *rem == 0 {
                return Ok(None);
            }
            *rem -= 1;
        }
        Ok(Some(self.value.clone()))
    }
}

/// An unbounded producer that calls a supplier for every item
pub struct GenerateProducer<F> {
    supplier: F,
}

impl<F> GenerateProducer<F> {
    pub fn new(supplier: F) -> Self {
        Self { supplier }
    }
}

impl<F, T> Producer for GenerateProducer<F>
where
    F: FnMut() -> T,
{
    type Item = T;

    fn produce(&mut self) -> Result<Option<Self::Item>> {
        Ok(Some((self.supplier)()))
    }
}

/// A producer yielding `seed, f(seed), f(f(seed)), ...`
///
/// Unbounded unless built with a `has_next` predicate, in which case it ends
/// at the first value failing the predicate.
pub struct IterateProducer<T, F> {
    next: Option<T>,
    step: F,
    has_next: Option<Box<dyn FnMut(&T) -> bool + Send>>,
}

impl<T, F> IterateProducer<T, F>
where
    F: FnMut(&T) -> T,
{
    /// Create an unbounded iterate producer
    pub fn new(seed: T, step: F) -> Self {
        Self {
            next: Some(seed),
            step,
            has_next: None,
        }
    }

    /// Create an iterate producer that ends when `has_next` fails
    pub fn bounded<P>(seed: T, has_next: P, step: F) -> Self
    where
        P: FnMut(&T) -> bool + Send + 'static,
    {
        Self {
            next: Some(seed),
            step,
            has_next: Some(Box::new(has_next)),
        }
    }
}

impl<T, F> Producer for IterateProducer<T, F>
where
    F: FnMut(&T) -> T,
{
    type Item = T;

    fn produce(&mut self) -> Result<Option<Self::Item>> {
        let Some(current) = self.next.take() else {
            return Ok(None);
        };
        if let Some(has_next) = self.has_next.as_mut() {
            if !has_next(&current) {
                return Ok(None);
            }
        }
        self.next = Some((self.step)(&current));
        Ok(Some(current))
    }
}

/// A producer created from a fallible function
pub struct FnProducer<F, T> {
    f: F,
    _phantom: PhantomData<fn() -> T>,
}

impl<F, T> Producer for FnProducer<F, T>
where
    F: FnMut() -> Result<Option<T>>,
{
    type Item = T;

    fn produce(&mut self) -> Result<Option<Self::Item>> {
        (self.f)()
    }
}

/// A producer that never yields anything
pub struct EmptyProducer<T> {
    _phantom: PhantomData<fn() -> T>,
}

impl<T> Default for EmptyProducer<T> {
    fn default() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<T> Producer for EmptyProducer<T> {
    type Item = T;

    fn produce(&mut self) -> Result<Option<Self::Item>> {
        Ok(None)
    }
}

/// A producer that yields everything from `first`, then everything from `second`
pub struct Chain<P1, P2> {
    first: Option<P1>,
    second: P2,
}

impl<P1, P2> Chain<P1, P2> {
    pub fn new(first: P1, second: P2) -> Self {
        Self {
            first: Some(first),
            second,
        }
    }
}

impl<P1, P2> Producer for Chain<P1, P2>
where
    P1: Producer,
    P2: Producer<Item = P1::Item>,
{
    type Item = P1::Item;

    fn produce(&mut self) -> Result<Option<Self::Item>> {
        if let Some(ref mut first) = self.first {
            match first.produce()? {
                Some(item) => return Ok(Some(item)),
                None => {
                    // First producer exhausted, switch to second
                    self.first = None;
                }
            }
        }
        self.second.produce()
    }
}

/// Enforces the single-pass contract of a producer.
///
/// Once the inner producer reported exhaustion, any further pull fails with
/// [`Error::ExhaustedProducer`] instead of reaching the inner producer again.
pub struct SinglePass<P> {
    inner: P,
    exhausted: bool,
}

impl<P> SinglePass<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            exhausted: false,
        }
    }

    /// Whether the inner producer has reported exhaustion
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

impl<P: Producer> Producer for SinglePass<P> {
    type Item = P::Item;

    fn produce(&mut self) -> Result<Option<Self::Item>> {
        if self.exhausted {
            return Err(Error::ExhaustedProducer);
        }
        let next = self.inner.produce()?;
        if next.is_none() {
            self.exhausted = true;
        }
        Ok(next)
    }
}

/// Producer over `range`
pub fn range(range: Range<i64>) -> RangeProducer {
    RangeProducer::new(range)
}

/// Producer over the items of a vector
pub fn from_vec<T>(items: Vec<T>) -> VecProducer<T> {
    VecProducer::new(items)
}

/// Producer over any iterable
pub fn from_iter<I: IntoIterator>(iter: I) -> IterProducer<I::IntoIter> {
    IterProducer::new(iter)
}

/// Unbounded producer repeating `value`
pub fn repeat<T: Clone>(value: T) -> RepeatProducer<T> {
    RepeatProducer::new(value)
}

/// Producer repeating `value` exactly `count` times
pub fn repeat_n<T: Clone>(value: T, count: usize) -> RepeatProducer<T> {
    RepeatProducer::times(value, count)
}

/// Unbounded producer calling `supplier` for every item
pub fn generate<T, F: FnMut() -> T>(supplier: F) -> GenerateProducer<F> {
    GenerateProducer::new(supplier)
}

/// Unbounded producer of `seed, step(seed), ...`
pub fn iterate<T, F: FnMut(&T) -> T>(seed: T, step: F) -> IterateProducer<T, F> {
    IterateProducer::new(seed, step)
}

/// Producer of `seed, step(seed), ...` ending at the first value failing `has_next`
pub fn iterate_while<T, P, F>(seed: T, has_next: P, step: F) -> IterateProducer<T, F>
where
    P: FnMut(&T) -> bool + Send + 'static,
    F: FnMut(&T) -> T,
{
    IterateProducer::bounded(seed, has_next, step)
}

/// Helper function to create a producer from a fallible function
pub fn from_fn<F, T>(f: F) -> FnProducer<F, T>
where
    F: FnMut() -> Result<Option<T>>,
{
    FnProducer {
        f,
        _phantom: PhantomData,
    }
}

/// Producer that is exhausted from the start
pub fn empty<T>() -> EmptyProducer<T> {
    EmptyProducer::default()
}
