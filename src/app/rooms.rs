//! Room bookkeeping.
//!
//! A room is created by its admin, who is also its first player. Members
//! join and leave freely until the admin closes it.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use thiserror::Error;
use tracing::debug;

/// Public view of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomData {
    pub id: u32,
    pub name: String,
    pub admin: String,
    pub max_players: u32,
    pub players: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("room {0} does not exist")]
    NotFound(u32),
    #[error("room {0} is full")]
    Full(u32),
    #[error("room name must not be empty")]
    EmptyName,
    #[error("a room needs room for at least one player")]
    NoCapacity,
    #[error("'{user}' is not the admin of room {room}")]
    NotAdmin { room: u32, user: String },
}

#[derive(Debug)]
pub struct RoomManager {
    rooms: RwLock<BTreeMap<u32, RoomData>>,
    next_id: AtomicU32,
}

impl RoomManager {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(BTreeMap::new()),
            next_id: AtomicU32::new(1),
        }
    }

    /// Open a room with `admin` as its first player.
    pub fn create_room(&self, admin: &str, name: &str, max_players: u32) -> Result<RoomData, RoomError> {
        if name.trim().is_empty() {
            return Err(RoomError::EmptyName);
        }
        if max_players == 0 {
            return Err(RoomError::NoCapacity);
        }

        let room = RoomData {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            name: name.to_string(),
            admin: admin.to_string(),
            max_players,
            players: vec![admin.to_string()],
        };
        self.rooms.write().insert(room.id, room.clone());

        debug!(room = room.id, admin, "Room created");
        Ok(room)
    }

    /// Add `user` to the room. Joining a room twice is a no-op.
    pub fn join_room(&self, room_id: u32, user: &str) -> Result<RoomData, RoomError> {
        let mut rooms = self.rooms.write();
        let room = rooms.get_mut(&room_id).ok_or(RoomError::NotFound(room_id))?;

        if !room.players.iter().any(|p| p == user) {
            if room.players.len() >= room.max_players as usize {
                return Err(RoomError::Full(room_id));
            }
            room.players.push(user.to_string());
        }

        Ok(room.clone())
    }

    /// Remove `user` from the room. Leaving a missing room is a no-op.
    pub fn leave_room(&self, room_id: u32, user: &str) {
        if let Some(room) = self.rooms.write().get_mut(&room_id) {
            room.players.retain(|p| p != user);
        }
    }

    /// Close the room. Only its admin may do so.
    pub fn close_room(&self, room_id: u32, user: &str) -> Result<RoomData, RoomError> {
        let mut rooms = self.rooms.write();
        let is_admin = rooms
            .get(&room_id)
            .map(|room| room.admin == user)
            .ok_or(RoomError::NotFound(room_id))?;
        if !is_admin {
            return Err(RoomError::NotAdmin {
                room: room_id,
                user: user.to_string(),
            });
        }

        debug!(room = room_id, "Room closed");
        rooms.remove(&room_id).ok_or(RoomError::NotFound(room_id))
    }

    pub fn get_room(&self, room_id: u32) -> Option<RoomData> {
        self.rooms.read().get(&room_id).cloned()
    }

    /// All open rooms ordered by id.
    pub fn get_rooms(&self) -> Vec<RoomData> {
        self.rooms.read().values().cloned().collect()
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_list() {
        let manager = RoomManager::new();
        let a = manager.create_room("alice", "first", 4).unwrap();
        let b = manager.create_room("bob", "second", 2).unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(a.players, vec!["alice"]);

        let rooms = manager.get_rooms();
        assert_eq!(rooms.len(), 2);
        assert_eq!(rooms[0].name, "first");
        assert_eq!(rooms[1].name, "second");
    }

    #[test]
    fn test_create_validation() {
        let manager = RoomManager::new();
        assert_eq!(manager.create_room("alice", "  ", 4), Err(RoomError::EmptyName));
        assert_eq!(manager.create_room("alice", "room", 0), Err(RoomError::NoCapacity));
    }

    #[test]
    fn test_join_until_full() {
        let manager = RoomManager::new();
        let room = manager.create_room("alice", "duo", 2).unwrap();

        let joined = manager.join_room(room.id, "bob").unwrap();
        assert_eq!(joined.players, vec!["alice", "bob"]);

        // Rejoining does not count twice
        assert!(manager.join_room(room.id, "bob").is_ok());

        assert_eq!(manager.join_room(room.id, "carol"), Err(RoomError::Full(room.id)));
        assert_eq!(manager.join_room(999, "carol"), Err(RoomError::NotFound(999)));
    }

    #[test]
    fn test_leave_room() {
        let manager = RoomManager::new();
        let room = manager.create_room("alice", "room", 4).unwrap();
        manager.join_room(room.id, "bob").unwrap();

        manager.leave_room(room.id, "bob");
        assert_eq!(manager.get_room(room.id).unwrap().players, vec!["alice"]);

        manager.leave_room(999, "bob");
    }

    #[test]
    fn test_close_room_admin_only() {
        let manager = RoomManager::new();
        let room = manager.create_room("alice", "room", 4).unwrap();

        assert!(matches!(
            manager.close_room(room.id, "bob"),
            Err(RoomError::NotAdmin { .. })
        ));

        let closed = manager.close_room(room.id, "alice").unwrap();
        assert_eq!(closed.id, room.id);
        assert!(manager.get_room(room.id).is_none());
        assert_eq!(manager.close_room(room.id, "alice"), Err(RoomError::NotFound(room.id)));
    }
}
