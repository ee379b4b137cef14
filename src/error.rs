//! Error types for pipelines, producers and collectors.

use std::sync::Arc;
use thiserror::Error;

/// The main error type for pipeline assembly and execution.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The pipeline (or another pipeline sharing its producer) was already driven
    #[error("pipeline has already been consumed")]
    ConsumedPipeline,

    /// A producer was pulled after it reported exhaustion
    #[error("producer pulled after reporting exhaustion")]
    ExhaustedProducer,

    /// A map collector met the same key twice without a merge function
    #[error("duplicate key {key}")]
    DuplicateKey { key: String },

    /// A value was requested from an absent result
    #[error("no value present")]
    EmptyResult,

    /// A collector was fed or finished after it had already finished
    #[error("collector has already finished")]
    CollectorFinished,

    /// The drive was cancelled through its cancellation token
    #[error("pipeline drive was cancelled")]
    Cancelled,

    /// A producer failed to generate an item
    #[error("producer error: {0}")]
    Producer(Arc<dyn std::error::Error + Send + Sync>),

    /// A parallel chunk task panicked or was aborted
    #[error("task failed: {0}")]
    Task(String),

    /// A custom error with a message
    #[error("{0}")]
    Custom(String),
}

// Convenience constructors
impl Error {
    /// Create a producer error from any error type
    pub fn producer<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Error::Producer(Arc::new(error))
    }

    /// Create a duplicate key error from the offending key
    pub fn duplicate_key<K: std::fmt::Debug>(key: &K) -> Self {
        Error::DuplicateKey {
            key: format!("{:?}", key),
        }
    }

    /// Create a custom error with a message
    pub fn custom<S: Into<String>>(message: S) -> Self {
        Error::Custom(message.into())
    }

    /// Whether this error signals misuse of the API rather than a data failure.
    pub fn is_logic_error(&self) -> bool {
        matches!(
            self,
            Error::ConsumedPipeline
                | Error::ExhaustedProducer
                | Error::EmptyResult
                | Error::CollectorFinished
        )
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Task(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::producer(e)
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Custom(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Custom(s.to_string())
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Helper trait for converting foreign errors into our Error type
pub trait IntoError<T> {
    fn into_producer_error(self) -> Result<T>;
}

impl<T, E> IntoError<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn into_producer_error(self) -> Result<T> {
        self.map_err(Error::producer)
    }
}
