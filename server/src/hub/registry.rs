//! Room Registry
//!
//! Process-wide index of live rooms. The registry lock is only a lookup
//! lock; room state is serialized by each room's own mutex, and registry
//! operations are never called while a room lock is held.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use super::room::Room;

/// Indexed collection of rooms, keyed by room ID.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, Arc<Room>>>,
}

impl RoomRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a room.
    pub async fn get(&self, room_id: &str) -> Option<Arc<Room>> {
        self.rooms.read().await.get(room_id).cloned()
    }

    /// Get a room, creating it with the caller as host if unknown.
    /// Returns whether the room was created by this call.
    pub async fn get_or_create(
        &self,
        room_id: &str,
        host_user_id: &str,
        host_conn_id: Uuid,
    ) -> (Arc<Room>, bool) {
        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.get(room_id) {
            return (room.clone(), false);
        }

        let room = Arc::new(Room::new(
            room_id.to_string(),
            host_user_id.to_string(),
            host_conn_id,
        ));
        rooms.insert(room_id.to_string(), room.clone());
        (room, true)
    }

    /// Remove a room from the index.
    pub async fn remove(&self, room_id: &str) -> Option<Arc<Room>> {
        self.rooms.write().await.remove(room_id)
    }

    /// Snapshot of all live rooms.
    pub async fn all(&self) -> Vec<Arc<Room>> {
        self.rooms.read().await.values().cloned().collect()
    }

    /// Number of live rooms.
    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// True when no rooms are live.
    pub async fn is_empty(&self) -> bool {
        self.rooms.read().await.is_empty()
    }
}
