//! Core traits for the producer/stage/sink system.
//!
//! This module defines the fundamental abstractions of a lazy pipeline: a
//! pull-based [`Producer`] at the root, [`Stage`]s that describe intermediate
//! operations, and [`Sink`]s that receive elements while a pipeline is driven.

use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::producers::{Chain, SinglePass};

/// A producer generates items on demand.
///
/// Producers are pull-based: they only generate an item when the driver asks
/// for one. A producer may be infinite, in which case the pipeline must be
/// bounded by `limit`, `take_while` or a short-circuiting terminal operation.
///
/// # Examples
///
/// ```rust
/// use streamfuse::core::{Producer, Result};
///
/// struct CounterProducer {
///     current: u64,
///     max: u64,
/// }
///
/// impl Producer for CounterProducer {
///     type Item = u64;
///
///     fn produce(&mut self) -> Result<Option<Self::Item>> {
///         if self.current <= self.max {
///             let item = self.current;
///             self.current += 1;
///             Ok(Some(item))
///         } else {
///             Ok(None) // Signal completion
///         }
///     }
/// }
/// ```
pub trait Producer {
    /// The type of items this producer generates
    type Item;

    /// Produce the next item, or None if the producer is exhausted.
    fn produce(&mut self) -> Result<Option<Self::Item>>;
}

impl<P: Producer + ?Sized> Producer for Box<P> {
    type Item = P::Item;

    fn produce(&mut self) -> Result<Option<Self::Item>> {
        (**self).produce()
    }
}

/// A sink receives elements during a single drive.
///
/// Every stage wraps the sink downstream of it, and every terminal operation
/// provides the innermost sink. The driver checks [`Sink::should_stop`] before
/// pulling each element and calls [`Sink::finish`] exactly once at the end.
///
/// # Examples
///
/// ```rust
/// use streamfuse::core::{Result, Sink};
///
/// struct FirstThree(Vec<i64>);
///
/// impl Sink for FirstThree {
///     type Item = i64;
///
///     fn accept(&mut self, item: Self::Item) -> Result<()> {
///         self.0.push(item);
///         Ok(())
///     }
///
///     fn should_stop(&self) -> bool {
///         self.0.len() >= 3
///     }
/// }
/// ```
pub trait Sink {
    /// The type of items this sink accepts
    type Item;

    /// Accept a single element.
    fn accept(&mut self, item: Self::Item) -> Result<()>;

    /// Whether the sink needs no further elements.
    fn should_stop(&self) -> bool {
        false
    }

    /// Called once when upstream is exhausted or the drive stopped early.
    ///
    /// Buffering sinks emit their contents here before finishing downstream.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: Sink + ?Sized> Sink for &mut S {
    type Item = S::Item;

    fn accept(&mut self, item: Self::Item) -> Result<()> {
        (**self).accept(item)
    }

    fn should_stop(&self) -> bool {
        (**self).should_stop()
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

/// The kind of an intermediate operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StageKind {
    Filter,
    Map,
    FlatMap,
    Peek,
    Distinct,
    Sorted,
    Limit,
    Skip,
    TakeWhile,
    DropWhile,
}

impl StageKind {
    /// Whether the stage keeps per-drive state that depends on encounter order.
    ///
    /// Pipelines with stateful stages are never split into parallel chunks.
    pub fn is_stateful(self) -> bool {
        !matches!(
            self,
            StageKind::Filter | StageKind::Map | StageKind::FlatMap | StageKind::Peek
        )
    }

    /// Whether the stage may stop the drive before upstream is exhausted.
    pub fn is_short_circuiting(self) -> bool {
        matches!(self, StageKind::Limit | StageKind::TakeWhile)
    }

    /// Lower-case name used in logs.
    pub fn name(self) -> &'static str {
        match self {
            StageKind::Filter => "filter",
            StageKind::Map => "map",
            StageKind::FlatMap => "flat_map",
            StageKind::Peek => "peek",
            StageKind::Distinct => "distinct",
            StageKind::Sorted => "sorted",
            StageKind::Limit => "limit",
            StageKind::Skip => "skip",
            StageKind::TakeWhile => "take_while",
            StageKind::DropWhile => "drop_while",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An intermediate operation descriptor.
///
/// A stage holds only its parameters and is immutable once built, so the same
/// descriptor can be shared by pipelines that branch from a common prefix.
/// State needed while driving lives in the sink returned by [`Stage::wrap`].
pub trait Stage: Send + Sync + 'static {
    /// The type of items this stage accepts
    type Input;
    /// The type of items this stage forwards downstream
    type Output;

    /// The kind tag of this stage.
    fn kind(&self) -> StageKind;

    /// Wrap `downstream` in a fresh sink that applies this stage.
    fn wrap<'a>(
        &'a self,
        downstream: &'a mut dyn Sink<Item = Self::Output>,
    ) -> Box<dyn Sink<Item = Self::Input> + 'a>;
}

/// Extension trait for composing producers.
pub trait ProducerExt: Producer + Sized {
    /// Chain with another producer
    fn chain<P2>(self, other: P2) -> Chain<Self, P2>
    where
        P2: Producer<Item = Self::Item>,
    {
        Chain::new(self, other)
    }

    /// Fail with `ExhaustedProducer` when pulled after reporting exhaustion
    fn single_pass(self) -> SinglePass<Self> {
        SinglePass::new(self)
    }

    /// Build a pipeline rooted at this producer
    fn into_pipeline(self) -> Pipeline<Self::Item>
    where
        Self: Send + 'static,
        Self::Item: Send + 'static,
    {
        Pipeline::from_producer(self)
    }
}

impl<P: Producer> ProducerExt for P {}
