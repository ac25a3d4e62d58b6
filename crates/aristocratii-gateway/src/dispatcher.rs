use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use aristocratii_types::events::ServerEvent;

use crate::rooms::{ConnId, Room, RoomRegistry};

/// Owns every live connection's outbound channel and the room registry.
/// Cloning is cheap; all clones share the same state.
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

#[derive(Default)]
struct DispatcherInner {
    /// Per-connection send channels: conn_id -> sender
    connections: RwLock<HashMap<ConnId, mpsc::UnboundedSender<ServerEvent>>>,

    /// Room memberships of live connections
    rooms: RwLock<RoomRegistry>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection. Returns (conn_id, receiver); the receiver
    /// yields every event addressed to this connection.
    pub async fn register_connection(&self) -> (ConnId, mpsc::UnboundedReceiver<ServerEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.connections.write().await.insert(conn_id, tx);
        (conn_id, rx)
    }

    /// Forget a connection and drop it from all rooms. Returns the rooms it left.
    pub async fn disconnect(&self, conn_id: ConnId) -> Vec<Room> {
        // Held across the room cleanup so a concurrent join cannot slip in between
        let mut connections = self.inner.connections.write().await;
        connections.remove(&conn_id);
        self.inner.rooms.write().await.remove_connection(conn_id)
    }

    /// Add a live connection to a room. Returns false if it was already a
    /// member or has disconnected.
    pub async fn join(&self, conn_id: ConnId, room: Room) -> bool {
        let connections = self.inner.connections.read().await;
        if !connections.contains_key(&conn_id) {
            return false;
        }
        self.inner.rooms.write().await.join(conn_id, room)
    }

    pub async fn leave(&self, conn_id: ConnId, room: Room) -> bool {
        self.inner.rooms.write().await.leave(conn_id, room)
    }

    #[cfg(test)]
    pub(crate) async fn rooms_of(&self, conn_id: ConnId) -> Vec<Room> {
        self.inner.rooms.read().await.rooms_of(conn_id)
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.connections.read().await.len()
    }

    /// Send an event to a single connection. Returns false if it is gone.
    pub async fn send_to_connection(&self, conn_id: ConnId, event: ServerEvent) -> bool {
        let connections = self.inner.connections.read().await;
        match connections.get(&conn_id) {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Send an event to every connection currently in `room`.
    /// Returns how many connections it was handed to.
    pub async fn send_to_room(&self, room: Room, event: &ServerEvent) -> usize {
        let members = self.inner.rooms.read().await.members(room);
        if members.is_empty() {
            return 0;
        }

        let connections = self.inner.connections.read().await;
        members
            .iter()
            .filter_map(|conn_id| connections.get(conn_id))
            .filter(|tx| tx.send(event.clone()).is_ok())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn room_broadcast_reaches_members_only() {
        let dispatcher = Dispatcher::new();
        let (a, mut rx_a) = dispatcher.register_connection().await;
        let (_b, mut rx_b) = dispatcher.register_connection().await;

        dispatcher.join(a, Room::Chat(1)).await;
        dispatcher.join(a, Room::Chat(1)).await;

        let event = ServerEvent::Left { chat_id: 1 };
        assert_eq!(dispatcher.send_to_room(Room::Chat(1), &event).await, 1);

        assert_eq!(rx_a.recv().await, Some(event));
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn disconnected_connection_gets_nothing() {
        let dispatcher = Dispatcher::new();
        let (a, mut rx_a) = dispatcher.register_connection().await;

        dispatcher.join(a, Room::Chat(1)).await;
        dispatcher.join(a, Room::User(3)).await;

        let mut left = dispatcher.disconnect(a).await;
        left.sort_by_key(|r| r.to_string());
        assert_eq!(left, vec![Room::Chat(1), Room::User(3)]);
        assert_eq!(dispatcher.connection_count().await, 0);

        let event = ServerEvent::Joined { chat_id: 1 };
        assert_eq!(dispatcher.send_to_room(Room::Chat(1), &event).await, 0);
        assert_eq!(dispatcher.send_to_room(Room::User(3), &event).await, 0);
        assert!(!dispatcher.send_to_connection(a, event).await);

        // sender was dropped with the registration
        assert_eq!(rx_a.recv().await, None);
    }

    #[tokio::test]
    async fn join_after_disconnect_leaves_no_membership() {
        let dispatcher = Dispatcher::new();
        let (a, _rx_a) = dispatcher.register_connection().await;
        dispatcher.disconnect(a).await;

        assert!(!dispatcher.join(a, Room::Chat(1)).await);
        assert!(dispatcher.rooms_of(a).await.is_empty());
        assert_eq!(dispatcher.inner.rooms.read().await.room_count(), 0);
    }
}
