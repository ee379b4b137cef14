//! Span and event helpers used when the `tracing` feature is enabled.

use crate::core::{Result, StageKind};

/// Render stage kinds as `filter -> map -> limit`.
pub fn describe_stages(stages: &[StageKind]) -> String {
    if stages.is_empty() {
        return "source".to_string();
    }
    stages
        .iter()
        .map(|kind| kind.name())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// The span every sequential drive runs in.
pub(crate) fn drive_span(stages: &[StageKind]) -> tracing::Span {
    let span = tracing::debug_span!("pipeline.drive", stages = %describe_stages(stages));
    span.in_scope(|| tracing::debug!("drive started"));
    span
}

pub(crate) fn drive_finished(pulled: u64, short_circuited: bool, result: &Result<()>) {
    match result {
        Ok(()) => tracing::debug!(pulled, short_circuited, "drive finished"),
        Err(crate::error::Error::Cancelled) => {
            tracing::warn!(pulled, "drive cancelled")
        }
        Err(e) => tracing::debug!(pulled, error = %e, "drive failed"),
    }
}
