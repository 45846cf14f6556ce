//! # Realtime Events
//!
//! Event envelope, the closed set of event types, and the cross-process
//! bus: publishes serialized envelopes over a single Postgres NOTIFY
//! channel; one process-local listener fans received events out to
//! registered handlers.

pub mod bus;

pub use bus::{EventBus, EventHandler};

use crate::error::{Result, WmsError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Channel every process publishes to and subscribes on.
pub const REALTIME_CHANNEL: &str = "wms_realtime_events";

/// Closed set of realtime event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RealtimeEventType {
    #[serde(rename = "TASK_ASSIGNED")]
    TaskAssigned,
    #[serde(rename = "TASK_UPDATED")]
    TaskUpdated,
    #[serde(rename = "OPERATOR_STATUS_UPDATED")]
    OperatorStatusUpdated,
    #[serde(rename = "USER_PRESENCE_UPDATED")]
    UserPresenceUpdated,
    #[serde(rename = "USER_LIST_UPDATED")]
    UserListUpdated,
}

impl RealtimeEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RealtimeEventType::TaskAssigned => "TASK_ASSIGNED",
            RealtimeEventType::TaskUpdated => "TASK_UPDATED",
            RealtimeEventType::OperatorStatusUpdated => "OPERATOR_STATUS_UPDATED",
            RealtimeEventType::UserPresenceUpdated => "USER_PRESENCE_UPDATED",
            RealtimeEventType::UserListUpdated => "USER_LIST_UPDATED",
        }
    }

    /// Presence and user-list traffic is for the manager room only.
    pub fn managers_only(&self) -> bool {
        matches!(
            self,
            RealtimeEventType::UserPresenceUpdated | RealtimeEventType::UserListUpdated
        )
    }
}

impl fmt::Display for RealtimeEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RealtimeEventType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "TASK_ASSIGNED" => Ok(RealtimeEventType::TaskAssigned),
            "TASK_UPDATED" => Ok(RealtimeEventType::TaskUpdated),
            "OPERATOR_STATUS_UPDATED" => Ok(RealtimeEventType::OperatorStatusUpdated),
            "USER_PRESENCE_UPDATED" => Ok(RealtimeEventType::UserPresenceUpdated),
            "USER_LIST_UPDATED" => Ok(RealtimeEventType::UserListUpdated),
            other => Err(format!("unknown realtime event type: {other}")),
        }
    }
}

/// Wire envelope for the realtime channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeEvent {
    #[serde(rename = "type")]
    pub event_type: RealtimeEventType,
    pub payload: serde_json::Value,
    #[serde(rename = "occurredAt")]
    pub occurred_at: DateTime<Utc>,
}

impl RealtimeEvent {
    pub fn new(event_type: RealtimeEventType, payload: serde_json::Value) -> Self {
        Self {
            event_type,
            payload,
            occurred_at: Utc::now(),
        }
    }

    /// Operator this event concerns, when its payload carries one under any
    /// of the accepted keys.
    pub fn operator_id(&self) -> Option<Uuid> {
        for key in ["operatorId", "operator_id", "assignedOperatorId"] {
            if let Some(raw) = self.payload.get(key).and_then(|v| v.as_str()) {
                if let Ok(id) = Uuid::parse_str(raw) {
                    return Some(id);
                }
            }
        }
        None
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| WmsError::EventError(e.to_string()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| WmsError::EventError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_serializes_with_wire_field_names() {
        let event = RealtimeEvent::new(
            RealtimeEventType::TaskAssigned,
            json!({"taskId": "t-1"}),
        );
        let value: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "TASK_ASSIGNED");
        assert!(value["occurredAt"].is_string());
    }

    #[test]
    fn operator_id_accepts_all_aliases() {
        let id = Uuid::new_v4();
        for key in ["operatorId", "operator_id", "assignedOperatorId"] {
            let event = RealtimeEvent::new(
                RealtimeEventType::TaskUpdated,
                json!({ key: id.to_string() }),
            );
            assert_eq!(event.operator_id(), Some(id), "alias {key}");
        }
    }

    #[test]
    fn operator_id_ignores_malformed_values() {
        let event = RealtimeEvent::new(
            RealtimeEventType::TaskUpdated,
            json!({"operatorId": "not-a-uuid"}),
        );
        assert_eq!(event.operator_id(), None);
    }

    #[test]
    fn presence_events_are_managers_only() {
        assert!(RealtimeEventType::UserPresenceUpdated.managers_only());
        assert!(RealtimeEventType::UserListUpdated.managers_only());
        assert!(!RealtimeEventType::TaskAssigned.managers_only());
    }
}
