//! # Task Generation
//!
//! Pure normalization/estimation/grouping logic plus the transactional
//! service that turns a normalized order event into persisted tasks,
//! idempotent per event key.

pub mod logic;
pub mod service;

pub use logic::{
    build_task_specs, calculate_estimated_seconds, normalize_order_event, pick_priority,
    NormalizedLine, NormalizedOrderEvent, OrderEventType, SpecLine, TaskSpec,
};
pub use service::{GenerationOutcome, TaskGenerationService};
