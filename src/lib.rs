//! # Lazy, fused, single-pass pipelines for Rust
//!
//! This crate provides a pull-based data pipeline: a producer at the root,
//! any number of intermediate stages, and a terminal operation that drives
//! one fused pass over the data.
//!
//! ## Core Concepts
//!
//! - **Producer**: Generates items on demand, possibly forever
//! - **Stage**: An intermediate operation (filter, map, sorted, limit, ...)
//! - **Sink**: Receives elements while a pipeline is driven
//! - **Collector**: A create/accumulate/combine/finish recipe for building results
//! - **Pipeline**: A lazily assembled chain, driven exactly once
//!
//! ## Example
//!
//! ```rust
//! use streamfuse::prelude::*;
//! use streamfuse::collectors::{counting, grouping_by_with};
//!
//! fn main() -> Result<()> {
//!     let by_length = Pipeline::of(vec!["A", "BB", "CCC", "DD"])
//!         .collect(grouping_by_with(|s: &&str| s.len(), counting()))?;
//!     assert_eq!(by_length.get(&2), Some(&2));
//!
//!     let first_even_square = Pipeline::from_iterator(1..)
//!         .map(|x: u64| x * x)
//!         .filter(|x| x % 2 == 0)
//!         .find_first()?;
//!     assert_eq!(first_even_square, Present(4));
//!     Ok(())
//! }
//! ```

pub mod collectors;
pub mod core;
pub mod error;
pub mod optional;
pub mod pipeline;
pub mod producers;
pub mod stages;
pub mod terminal;
pub mod util;

// Re-export commonly used items
pub mod prelude {
    pub use crate::collectors::Collector;
    pub use crate::core::{Producer, ProducerExt, Sink, Stage, StageKind};
    pub use crate::error::{Error, Result};
    pub use crate::optional::{Absent, OptionalResult, Present};
    pub use crate::pipeline::{Pipeline, PipelineConfig};
    pub use crate::producers::*;
    pub use crate::util::{AsyncProducer, BlockingProducer, StreamProducer};
}

// Re-export main error type
pub use error::{Error, Result};

// Feature flags for optional dependencies
#[cfg(feature = "metrics")]
pub mod metrics;

#[cfg(feature = "tracing")]
pub mod tracing_support;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
