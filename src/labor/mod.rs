//! # Labor Metrics
//!
//! Pure shift/utilization math and the scheduled daily aggregator that
//! upserts per-operator metrics.

pub mod aggregator;
pub mod shift;

pub use aggregator::{LaborMetricsAggregator, MetricsCycleStats};
pub use shift::{parse_shift_time, shift_duration_seconds, utilization_percent};
