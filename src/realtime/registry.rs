//! Process-local socket registry: user -> active connections, with room
//! membership per connection. Mutated only from the socket dispatcher path.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

struct ConnectionEntry {
    user_id: String,
    rooms: HashSet<String>,
    sender: mpsc::UnboundedSender<String>,
}

#[derive(Default)]
struct RegistryInner {
    connections: HashMap<u64, ConnectionEntry>,
    by_user: HashMap<String, HashSet<u64>>,
}

#[derive(Default)]
pub struct SocketRegistry {
    inner: Mutex<RegistryInner>,
    next_id: AtomicU64,
}

impl SocketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection; returns its id for unregistration.
    pub fn register(
        &self,
        user_id: &str,
        rooms: HashSet<String>,
        sender: mpsc::UnboundedSender<String>,
    ) -> u64 {
        let conn_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock();
        inner.connections.insert(
            conn_id,
            ConnectionEntry {
                user_id: user_id.to_string(),
                rooms,
                sender,
            },
        );
        inner
            .by_user
            .entry(user_id.to_string())
            .or_default()
            .insert(conn_id);
        conn_id
    }

    /// Drop a connection. Returns the user id and how many of their
    /// connections remain, for presence recomputation.
    pub fn unregister(&self, conn_id: u64) -> Option<(String, usize)> {
        let mut inner = self.inner.lock();
        let entry = inner.connections.remove(&conn_id)?;
        let remaining = match inner.by_user.get_mut(&entry.user_id) {
            Some(set) => {
                set.remove(&conn_id);
                let remaining = set.len();
                if set.is_empty() {
                    inner.by_user.remove(&entry.user_id);
                }
                remaining
            }
            None => 0,
        };
        Some((entry.user_id, remaining))
    }

    /// Send a serialized message to every connection in any of the rooms.
    /// Dead senders are ignored; the socket loop cleans them up on exit.
    pub fn send_to_rooms(&self, rooms: &[String], message: &str) -> usize {
        let inner = self.inner.lock();
        let mut delivered = 0;
        for entry in inner.connections.values() {
            if rooms.iter().any(|room| entry.rooms.contains(room)) {
                if entry.sender.send(message.to_string()).is_ok() {
                    delivered += 1;
                }
            }
        }
        delivered
    }

    /// User ids with at least one active connection, sorted for stable
    /// user-list payloads.
    pub fn online_users(&self) -> Vec<String> {
        let inner = self.inner.lock();
        let mut users: Vec<String> = inner.by_user.keys().cloned().collect();
        users.sort();
        users
    }

    pub fn connection_count(&self) -> usize {
        self.inner.lock().connections.len()
    }

    /// Drop every sender, closing all socket loops.
    pub fn close_all(&self) {
        let mut inner = self.inner.lock();
        inner.connections.clear();
        inner.by_user.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rooms(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn register_unregister_tracks_presence() {
        let registry = SocketRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let a = registry.register("user-1", rooms(&["manager"]), tx.clone());
        let b = registry.register("user-1", rooms(&["manager"]), tx);

        assert_eq!(registry.online_users(), vec!["user-1".to_string()]);

        let (user, remaining) = registry.unregister(a).unwrap();
        assert_eq!(user, "user-1");
        assert_eq!(remaining, 1);

        let (_, remaining) = registry.unregister(b).unwrap();
        assert_eq!(remaining, 0);
        assert!(registry.online_users().is_empty());
    }

    #[test]
    fn room_fanout_reaches_only_members() {
        let registry = SocketRegistry::new();
        let (manager_tx, mut manager_rx) = mpsc::unbounded_channel();
        let (operator_tx, mut operator_rx) = mpsc::unbounded_channel();
        registry.register("mgr", rooms(&["manager"]), manager_tx);
        registry.register("op", rooms(&["operator:abc"]), operator_tx);

        let delivered = registry.send_to_rooms(&["manager".to_string()], "hello");
        assert_eq!(delivered, 1);
        assert_eq!(manager_rx.try_recv().unwrap(), "hello");
        assert!(operator_rx.try_recv().is_err());
    }

    #[test]
    fn multi_room_connections_receive_once() {
        let registry = SocketRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register("both", rooms(&["manager", "operator:x"]), tx);

        let delivered = registry.send_to_rooms(
            &["manager".to_string(), "operator:x".to_string()],
            "event",
        );
        assert_eq!(delivered, 1);
        assert_eq!(rx.try_recv().unwrap(), "event");
        assert!(rx.try_recv().is_err());
    }
}
