use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::model::RoomInfo;

use super::EngineError;

/// Room metadata keyed by room id. Knows nothing about bookings.
pub struct RoomDirectory {
    rooms: DashMap<String, RoomInfo>,
    /// Claimed room slots. Incremented before an insert lands, so it never trails `rooms.len()`.
    slots: AtomicUsize,
}

impl Default for RoomDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            slots: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.rooms.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<RoomInfo> {
        self.rooms.get(id).map(|e| e.value().clone())
    }

    /// Insert unless the id is taken or the directory already holds `limit` rooms.
    ///
    /// The limit is exact under concurrent inserts: a slot is claimed atomically
    /// first and handed back if the insert does not happen.
    pub fn insert_new(&self, room: RoomInfo, limit: usize) -> Result<(), EngineError> {
        let claimed = self
            .slots
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < limit).then_some(n + 1));
        if claimed.is_err() {
            return Err(EngineError::LimitExceeded("too many rooms"));
        }
        match self.rooms.entry(room.id.clone()) {
            Entry::Occupied(_) => {
                self.slots.fetch_sub(1, Ordering::AcqRel);
                Err(EngineError::AlreadyExists(room.id))
            }
            Entry::Vacant(slot) => {
                slot.insert(room);
                Ok(())
            }
        }
    }

    pub fn remove(&self, id: &str) -> Option<RoomInfo> {
        let removed = self.rooms.remove(id).map(|(_, room)| room);
        if removed.is_some() {
            self.slots.fetch_sub(1, Ordering::AcqRel);
        }
        removed
    }

    /// All rooms sorted by id.
    pub fn list(&self) -> Vec<RoomInfo> {
        let mut rooms: Vec<RoomInfo> = self.rooms.iter().map(|e| e.value().clone()).collect();
        rooms.sort_by(|a, b| a.id.cmp(&b.id));
        rooms
    }
}
