use ulid::Ulid;

use crate::model::*;

use super::{Engine, EngineError, SharedLedger};

impl Engine {
    pub fn get_room(&self, room_id: &str) -> Result<RoomInfo, EngineError> {
        self.rooms
            .get(room_id)
            .ok_or_else(|| EngineError::RoomNotFound(room_id.to_string()))
    }

    pub fn list_rooms(&self) -> Vec<RoomInfo> {
        self.rooms.list()
    }

    /// Bookings of one room in canonical order.
    pub async fn list_for(&self, room_id: &str) -> Result<Vec<Interval>, EngineError> {
        let ledger = self.ensure_ledger(room_id)?;
        let guard = ledger.read().await;
        if guard.is_retired() {
            return Err(EngineError::RoomNotFound(room_id.to_string()));
        }
        Ok(guard.list())
    }

    /// Every booking across every room, ordered by `(start, room_id)`.
    ///
    /// Each ledger is snapshotted under its own read lock; no global lock is taken.
    pub async fn list_all(&self) -> Vec<BookingInfo> {
        let ledgers: Vec<SharedLedger> = self.ledgers.iter().map(|e| e.value().clone()).collect();

        let mut all = Vec::new();
        for ledger in ledgers {
            let guard = ledger.read().await;
            if guard.is_retired() {
                continue;
            }
            all.extend(guard.list().iter().map(|i| BookingInfo::new(guard.room_id(), i)));
        }

        all.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then_with(|| a.room_id.cmp(&b.room_id))
                .then_with(|| a.end.cmp(&b.end))
                .then_with(|| a.id.cmp(&b.id))
        });
        all
    }

    pub async fn get_booking(&self, room_id: &str, booking_id: Ulid) -> Result<Interval, EngineError> {
        let ledger = self.ensure_ledger(room_id)?;
        let guard = ledger.read().await;
        if guard.is_retired() {
            return Err(EngineError::RoomNotFound(room_id.to_string()));
        }
        guard.get(&booking_id).ok_or(EngineError::NotFound(booking_id))
    }

    pub async fn free_slots(
        &self,
        room_id: &str,
        window_start: Micros,
        window_end: Micros,
        min_duration: Micros,
    ) -> Result<Vec<Span>, EngineError> {
        let ledger = self.ensure_ledger(room_id)?;
        let guard = ledger.read().await;
        if guard.is_retired() {
            return Err(EngineError::RoomNotFound(room_id.to_string()));
        }
        guard.free_slots(window_start, window_end, min_duration)
    }

    /// True when the room exists and holds no bookings.
    pub async fn is_room_empty(&self, room_id: &str) -> Result<bool, EngineError> {
        let ledger = self.ensure_ledger(room_id)?;
        let guard = ledger.read().await;
        if guard.is_retired() {
            return Err(EngineError::RoomNotFound(room_id.to_string()));
        }
        Ok(guard.is_empty())
    }
}
