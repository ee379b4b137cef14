//! Drive counters recorded through the `metrics` facade.
//!
//! Nothing is exported unless a recorder is installed by the application.

use std::sync::atomic::{AtomicBool, Ordering};

use metrics::{counter, Unit};

static METRICS_DESCRIBED: AtomicBool = AtomicBool::new(false);

pub const DRIVES_TOTAL: &str = "streamfuse_drives_total";
pub const ELEMENTS_PULLED_TOTAL: &str = "streamfuse_elements_pulled_total";
pub const SHORT_CIRCUITS_TOTAL: &str = "streamfuse_short_circuits_total";
pub const PARALLEL_CHUNKS_TOTAL: &str = "streamfuse_parallel_chunks_total";

/// Register descriptions for all counters. Later calls are no-ops.
pub fn describe_metrics() {
    if METRICS_DESCRIBED.swap(true, Ordering::SeqCst) {
        return;
    }
    metrics::describe_counter!(DRIVES_TOTAL, Unit::Count, "Pipelines driven");
    metrics::describe_counter!(
        ELEMENTS_PULLED_TOTAL,
        Unit::Count,
        "Elements pulled from producers"
    );
    metrics::describe_counter!(
        SHORT_CIRCUITS_TOTAL,
        Unit::Count,
        "Drives stopped before their producer was exhausted"
    );
    metrics::describe_counter!(
        PARALLEL_CHUNKS_TOTAL,
        Unit::Count,
        "Chunks dispatched by parallel collects"
    );
}

#[inline]
pub(crate) fn record_drive(pulled: u64, short_circuited: bool) {
    counter!(DRIVES_TOTAL).increment(1);
    counter!(ELEMENTS_PULLED_TOTAL).increment(pulled);
    if short_circuited {
        counter!(SHORT_CIRCUITS_TOTAL).increment(1);
    }
}

#[inline]
pub(crate) fn record_parallel_chunk() {
    counter!(PARALLEL_CHUNKS_TOTAL).increment(1);
}
