//! # Realtime Gateway
//!
//! Authenticated WebSocket sessions with room membership (`manager`,
//! `operator:<id>`), a process-local socket registry keyed by user, and
//! bus-driven fan-out of realtime events to room subscribers.

pub mod gateway;
pub mod registry;

pub use gateway::RealtimeGateway;
pub use registry::SocketRegistry;

/// Room every manager session joins.
pub const MANAGER_ROOM: &str = "manager";

/// Room for one operator's sessions.
pub fn operator_room(operator_id: uuid::Uuid) -> String {
    format!("operator:{operator_id}")
}
