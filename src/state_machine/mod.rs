//! # Task State Machine
//!
//! Status enumeration and the transition table for warehouse tasks. The
//! table is the single source of truth; `services::task_service` consults it
//! under a row lock before applying any mutation.

pub mod states;

pub use states::{TaskStatus, TransitionError};
