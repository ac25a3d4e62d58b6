use std::collections::{HashMap, HashSet};
use std::fmt;

use uuid::Uuid;

/// Identifies one live socket connection.
pub type ConnId = Uuid;

/// A broadcast group. Chat rooms and personal rooms live in separate
/// namespaces, so `Chat(5)` and `User(5)` are different rooms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Room {
    Chat(i64),
    User(i64),
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chat(id) => write!(f, "CHAT{}", id),
            Self::User(id) => write!(f, "USER{}", id),
        }
    }
}

/// Two-way index between connections and the rooms they joined.
///
/// Both maps are kept in sync by every mutation; a room with no members and a
/// connection with no rooms are removed rather than left empty.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<Room, HashSet<ConnId>>,
    memberships: HashMap<ConnId, HashSet<Room>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a room. Returns false if it was already a member.
    pub fn join(&mut self, conn: ConnId, room: Room) -> bool {
        let added = self.rooms.entry(room).or_default().insert(conn);
        self.memberships.entry(conn).or_default().insert(room);
        added
    }

    /// Remove a connection from a room. Returns false if it was not a member.
    pub fn leave(&mut self, conn: ConnId, room: Room) -> bool {
        let removed = match self.rooms.get_mut(&room) {
            Some(members) => {
                let removed = members.remove(&conn);
                if members.is_empty() {
                    self.rooms.remove(&room);
                }
                removed
            }
            None => false,
        };

        if let Some(joined) = self.memberships.get_mut(&conn) {
            joined.remove(&room);
            if joined.is_empty() {
                self.memberships.remove(&conn);
            }
        }

        removed
    }

    /// Drop a connection from every room it joined. Returns those rooms.
    pub fn remove_connection(&mut self, conn: ConnId) -> Vec<Room> {
        let joined: Vec<Room> = self
            .memberships
            .remove(&conn)
            .map(|rooms| rooms.into_iter().collect())
            .unwrap_or_default();

        for room in &joined {
            if let Some(members) = self.rooms.get_mut(room) {
                members.remove(&conn);
                if members.is_empty() {
                    self.rooms.remove(room);
                }
            }
        }

        joined
    }

    pub fn members(&self, room: Room) -> Vec<ConnId> {
        self.rooms
            .get(&room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) fn rooms_of(&self, conn: ConnId) -> Vec<Room> {
        self.memberships
            .get(&conn)
            .map(|rooms| rooms.iter().copied().collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) fn is_member(&self, conn: ConnId, room: Room) -> bool {
        self.rooms.get(&room).is_some_and(|members| members.contains(&conn))
    }

    #[cfg(test)]
    pub(crate) fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_keys_are_namespaced() {
        assert_eq!(Room::Chat(5).to_string(), "CHAT5");
        assert_eq!(Room::User(5).to_string(), "USER5");
        assert_ne!(Room::Chat(5), Room::User(5));

        let mut registry = RoomRegistry::new();
        let conn = Uuid::new_v4();
        registry.join(conn, Room::Chat(5));
        assert!(registry.members(Room::User(5)).is_empty());
    }

    #[test]
    fn join_is_idempotent() {
        let mut registry = RoomRegistry::new();
        let conn = Uuid::new_v4();

        assert!(registry.join(conn, Room::Chat(1)));
        assert!(!registry.join(conn, Room::Chat(1)));

        assert_eq!(registry.members(Room::Chat(1)), vec![conn]);
        assert_eq!(registry.rooms_of(conn), vec![Room::Chat(1)]);
    }

    #[test]
    fn leave_unknown_room_is_noop() {
        let mut registry = RoomRegistry::new();
        let conn = Uuid::new_v4();

        assert!(!registry.leave(conn, Room::Chat(9)));

        registry.join(conn, Room::Chat(1));
        assert!(!registry.leave(conn, Room::Chat(9)));
        assert!(registry.is_member(conn, Room::Chat(1)));

        assert!(registry.leave(conn, Room::Chat(1)));
        assert_eq!(registry.room_count(), 0);
        assert!(registry.rooms_of(conn).is_empty());
    }

    #[test]
    fn remove_connection_clears_every_room() {
        let mut registry = RoomRegistry::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        registry.join(a, Room::Chat(1));
        registry.join(a, Room::Chat(2));
        registry.join(a, Room::User(7));
        registry.join(b, Room::Chat(1));

        let mut left = registry.remove_connection(a);
        left.sort_by_key(|r| r.to_string());
        assert_eq!(left, vec![Room::Chat(1), Room::Chat(2), Room::User(7)]);

        assert!(registry.rooms_of(a).is_empty());
        assert_eq!(registry.members(Room::Chat(1)), vec![b]);
        assert!(registry.members(Room::Chat(2)).is_empty());
        assert_eq!(registry.room_count(), 1);

        assert!(registry.remove_connection(a).is_empty());
    }
}
