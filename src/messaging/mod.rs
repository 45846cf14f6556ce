//! # Messaging
//!
//! Durable queue plumbing on pgmq: a thin client over the SQL function
//! surface and the task-generation consumer with backoff-retry.

pub mod consumer;
pub mod pgmq_client;

pub use consumer::GenerationConsumer;
pub use pgmq_client::{PgmqClient, QueueDepth, QueueMessage};
