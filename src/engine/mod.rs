mod availability;
mod conflict;
mod directory;
mod error;
mod ledger;
mod mutations;
mod queries;

pub use directory::RoomDirectory;
pub use error::{EngineError, ErrorClass};
pub use ledger::Ledger;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::RwLock;

use crate::model::*;

pub type SharedLedger = Arc<RwLock<Ledger>>;

/// Rooms shipped with a fresh server when seeding is enabled.
const DEFAULT_ROOMS: [(&str, &str, u32, &str); 3] = [
    (
        "conference-room-1",
        "Main Conference Room",
        12,
        "Large conference room with projector",
    ),
    (
        "meeting-room-2",
        "Small Meeting Room",
        6,
        "Cozy meeting space for small teams",
    ),
    (
        "boardroom-3",
        "Executive Boardroom",
        8,
        "Executive boardroom with video conferencing",
    ),
];

/// Booking registry: one independently locked ledger per room.
///
/// Operations on different rooms never share a lock; the `DashMap` shards only
/// guard the room-id → ledger lookup and are never held across an await.
pub struct Engine {
    pub(super) rooms: RoomDirectory,
    pub(super) ledgers: DashMap<String, SharedLedger>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            rooms: RoomDirectory::new(),
            ledgers: DashMap::new(),
        }
    }

    /// Install the three stock rooms. Rooms that already exist are left alone.
    pub fn seed_default_rooms(&self) {
        for (id, name, capacity, description) in DEFAULT_ROOMS {
            match self.create_room(
                Some(id.to_string()),
                name.to_string(),
                Some(capacity),
                Some(description.to_string()),
            ) {
                Ok(_) => tracing::info!("seeded room {id}"),
                Err(e) => tracing::debug!("skip seeding {id}: {e}"),
            }
        }
    }

    pub fn directory(&self) -> &RoomDirectory {
        &self.rooms
    }

    pub fn ledger_for(&self, room_id: &str) -> Option<SharedLedger> {
        self.ledgers.get(room_id).map(|e| e.value().clone())
    }

    /// Atomic get-or-create of a known room's ledger.
    ///
    /// Concurrent first touches of the same id observe a single ledger. Fails
    /// with `RoomNotFound` if the room is not in the directory.
    pub fn ensure_ledger(&self, room_id: &str) -> Result<SharedLedger, EngineError> {
        if !self.rooms.contains(room_id) {
            return Err(EngineError::RoomNotFound(room_id.to_string()));
        }
        let ledger = self
            .ledgers
            .entry(room_id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(Ledger::new(room_id))))
            .value()
            .clone();
        // The room may have been deleted between the check and the insert.
        if !self.rooms.contains(room_id) {
            self.ledgers
                .remove_if(room_id, |_, existing| Arc::ptr_eq(existing, &ledger));
            return Err(EngineError::RoomNotFound(room_id.to_string()));
        }
        Ok(ledger)
    }
}
