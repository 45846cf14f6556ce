//! WebSocket gateway: session auth, room membership, presence, and
//! bus-driven broadcast.

use crate::error::{Result, WmsError};
use crate::events::{EventBus, EventHandler, RealtimeEvent, RealtimeEventType};
use crate::realtime::registry::SocketRegistry;
use crate::realtime::{operator_room, MANAGER_ROOM};
use crate::web::auth::{extract_bearer_token, Claims, JwtAuthenticator};
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use axum::http::HeaderMap;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const PING_INTERVAL: Duration = Duration::from_secs(30);
const PONG_TIMEOUT: Duration = Duration::from_secs(60);

/// Gateway shared across socket sessions and registered on the event bus.
pub struct RealtimeGateway {
    registry: Arc<SocketRegistry>,
    authenticator: JwtAuthenticator,
    bus: EventBus,
}

impl RealtimeGateway {
    pub fn new(authenticator: JwtAuthenticator, bus: EventBus) -> Self {
        Self {
            registry: Arc::new(SocketRegistry::new()),
            authenticator,
            bus,
        }
    }

    pub fn registry(&self) -> &Arc<SocketRegistry> {
        &self.registry
    }

    /// Authenticate a connection attempt from the handshake: a `token`
    /// query parameter or an `Authorization: Bearer` header. Returns the
    /// claims and the rooms the session joins.
    pub fn authenticate(
        &self,
        query: &HashMap<String, String>,
        headers: &HeaderMap,
    ) -> Result<(Claims, HashSet<String>)> {
        let token = query
            .get("token")
            .map(String::as_str)
            .or_else(|| {
                headers
                    .get("authorization")
                    .and_then(|value| value.to_str().ok())
                    .and_then(|raw| extract_bearer_token(raw).ok())
            })
            .ok_or_else(|| WmsError::Unauthorized("missing token".to_string()))?;

        let claims = self.authenticator.validate(token)?;

        let mut rooms = HashSet::new();
        if claims.is_manager() {
            rooms.insert(MANAGER_ROOM.to_string());
        } else {
            let operator_id = claims.operator_id.ok_or_else(|| {
                WmsError::Unauthorized("operator token missing operator claim".to_string())
            })?;
            rooms.insert(operator_room(operator_id));
        }
        Ok((claims, rooms))
    }

    /// Run one socket session to completion. Registers the connection,
    /// broadcasts presence, pumps the socket, and cleans up on exit.
    pub async fn run_session(self: Arc<Self>, socket: WebSocket, claims: Claims, rooms: HashSet<String>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let conn_id = self.registry.register(&claims.sub, rooms, outbound_tx);

        info!(user_id = %claims.sub, conn_id, "Socket session opened");
        self.publish_presence(&claims.sub, true).await;

        let (sender, receiver) = socket.split();
        run_socket_loop(sender, receiver, outbound_rx).await;

        if let Some((user_id, remaining)) = self.registry.unregister(conn_id) {
            info!(user_id = %user_id, conn_id, remaining, "Socket session closed");
            if remaining == 0 {
                self.publish_presence(&user_id, false).await;
            }
        }
    }

    /// Presence and user-list updates ride the bus so every process's
    /// manager room sees them. Best-effort.
    async fn publish_presence(&self, user_id: &str, online: bool) {
        let presence = json!({
            "userId": user_id,
            "online": online,
        });
        if let Err(e) = self
            .bus
            .publish(RealtimeEventType::UserPresenceUpdated, presence)
            .await
        {
            warn!(error = %e, "Failed to publish USER_PRESENCE_UPDATED");
        }

        let user_list = json!({ "users": self.registry.online_users() });
        if let Err(e) = self
            .bus
            .publish(RealtimeEventType::UserListUpdated, user_list)
            .await
        {
            warn!(error = %e, "Failed to publish USER_LIST_UPDATED");
        }
    }

    /// Rooms an event fans out to: always `manager`; task/operator events
    /// additionally reach the operator named in the payload.
    fn target_rooms(event: &RealtimeEvent) -> Vec<String> {
        let mut rooms = vec![MANAGER_ROOM.to_string()];
        if !event.event_type.managers_only() {
            if let Some(operator_id) = event.operator_id() {
                rooms.push(operator_room(operator_id));
            }
        }
        rooms
    }

    /// Close the gateway: drop all socket senders, ending every session
    /// loop.
    pub fn close(&self) {
        self.registry.close_all();
    }
}

#[async_trait]
impl EventHandler for RealtimeGateway {
    async fn handle_event(&self, event: RealtimeEvent) -> Result<()> {
        let rooms = Self::target_rooms(&event);
        let serialized = event.to_json()?;
        let delivered = self.registry.send_to_rooms(&rooms, &serialized);
        debug!(
            event_type = %event.event_type,
            ?rooms,
            delivered,
            "Fanned out realtime event"
        );
        Ok(())
    }
}

/// Socket pump with ping/pong keepalive: forwards registry messages out,
/// watches for pong/close from the client, and drops dead connections.
async fn run_socket_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    mut outbound: mpsc::UnboundedReceiver<String>,
) {
    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    ping_interval.tick().await;

    let mut last_pong = Instant::now();
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if awaiting_pong && last_pong.elapsed() > PONG_TIMEOUT {
                    break;
                }
                if sender.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
                awaiting_pong = true;
            }

            message = outbound.recv() => {
                match message {
                    Some(text) => {
                        if sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    // Registry dropped the sender (gateway close).
                    None => break,
                }
            }

            inbound = receiver.next() => {
                match inbound {
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = Instant::now();
                        awaiting_pong = false;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    let _ = sender.send(Message::Close(None)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthSettings;
    use crate::models::User;
    use chrono::Utc;
    use uuid::Uuid;

    fn gateway() -> RealtimeGateway {
        let settings = AuthSettings {
            jwt_secret: "gateway-test-secret".to_string(),
            jwt_lifetime_hours: 8,
            bcrypt_cost: 4,
        };
        let authenticator = JwtAuthenticator::from_settings(&settings).unwrap();
        let pool = sqlx::PgPool::connect_lazy("postgresql://localhost/unused").unwrap();
        RealtimeGateway::new(authenticator, EventBus::new(pool))
    }

    fn token_for(gateway: &RealtimeGateway, role: &str, operator_id: Option<Uuid>) -> String {
        gateway
            .authenticator
            .issue_token(&User {
                id: Uuid::new_v4(),
                username: "u".to_string(),
                password_hash: String::new(),
                role: role.to_string(),
                operator_id,
                created_at: Utc::now(),
            })
            .unwrap()
    }

    #[tokio::test]
    async fn manager_joins_manager_room() {
        let gateway = gateway();
        let token = token_for(&gateway, "warehouse_manager", None);
        let query = HashMap::from([("token".to_string(), token)]);
        let (_, rooms) = gateway.authenticate(&query, &HeaderMap::new()).unwrap();
        assert!(rooms.contains(MANAGER_ROOM));
        assert_eq!(rooms.len(), 1);
    }

    #[tokio::test]
    async fn operator_joins_operator_room() {
        let gateway = gateway();
        let operator_id = Uuid::new_v4();
        let token = token_for(&gateway, "operator", Some(operator_id));
        let query = HashMap::from([("token".to_string(), token)]);
        let (claims, rooms) = gateway.authenticate(&query, &HeaderMap::new()).unwrap();
        assert_eq!(claims.operator_id, Some(operator_id));
        assert!(rooms.contains(&operator_room(operator_id)));
    }

    #[tokio::test]
    async fn operator_without_claim_is_rejected() {
        let gateway = gateway();
        let token = token_for(&gateway, "operator", None);
        let query = HashMap::from([("token".to_string(), token)]);
        assert!(matches!(
            gateway.authenticate(&query, &HeaderMap::new()),
            Err(WmsError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn missing_token_is_rejected() {
        let gateway = gateway();
        assert!(matches!(
            gateway.authenticate(&HashMap::new(), &HeaderMap::new()),
            Err(WmsError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn bearer_header_is_accepted() {
        let gateway = gateway();
        let token = token_for(&gateway, "admin", None);
        let mut headers = HeaderMap::new();
        headers.insert("authorization", format!("Bearer {token}").parse().unwrap());
        assert!(gateway.authenticate(&HashMap::new(), &headers).is_ok());
    }

    #[test]
    fn task_events_reach_manager_and_operator_rooms() {
        let operator_id = Uuid::new_v4();
        let event = RealtimeEvent::new(
            RealtimeEventType::TaskAssigned,
            json!({"assignedOperatorId": operator_id.to_string()}),
        );
        let rooms = RealtimeGateway::target_rooms(&event);
        assert!(rooms.contains(&MANAGER_ROOM.to_string()));
        assert!(rooms.contains(&operator_room(operator_id)));
    }

    #[test]
    fn presence_events_stay_with_managers() {
        let event = RealtimeEvent::new(
            RealtimeEventType::UserPresenceUpdated,
            json!({"userId": "u", "operatorId": Uuid::new_v4().to_string()}),
        );
        let rooms = RealtimeGateway::target_rooms(&event);
        assert_eq!(rooms, vec![MANAGER_ROOM.to_string()]);
    }
}
