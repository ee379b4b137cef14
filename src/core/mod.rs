//! Core traits and types for the streamfuse library.
//!
//! This module contains the fundamental traits and error types that define
//! the streamfuse processing model.

pub mod traits;

// Re-export core items
pub use crate::error::{Error, Result};
pub use traits::{Producer, ProducerExt, Sink, Stage, StageKind};
