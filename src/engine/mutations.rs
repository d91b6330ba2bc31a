use std::sync::Arc;

use tracing::debug;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::conflict::now_us;
use super::{Engine, EngineError};

/// `room-` followed by the last eight characters of a fresh ULID (the random part).
fn generate_room_id() -> String {
    let ulid = Ulid::new().to_string().to_lowercase();
    format!("room-{}", &ulid[ulid.len() - 8..])
}

impl Engine {
    pub fn create_room(
        &self,
        id: Option<String>,
        name: String,
        capacity: Option<u32>,
        description: Option<String>,
    ) -> Result<RoomInfo, EngineError> {
        if name.len() > MAX_ROOM_NAME_LEN {
            return Err(EngineError::LimitExceeded("room name too long"));
        }
        if let Some(ref d) = description
            && d.len() > MAX_DESCRIPTION_LEN
        {
            return Err(EngineError::LimitExceeded("room description too long"));
        }
        if let Some(ref id) = id
            && (id.is_empty() || id.len() > MAX_ROOM_ID_LEN)
        {
            return Err(EngineError::LimitExceeded("room id must be 1..=128 bytes"));
        }

        let room = RoomInfo {
            id: id.unwrap_or_else(generate_room_id),
            name,
            capacity,
            description,
        };
        self.rooms.insert_new(room.clone(), MAX_ROOMS)?;
        self.ensure_ledger(&room.id)?;

        metrics::gauge!(observability::ROOMS_ACTIVE).set(self.rooms.len() as f64);
        debug!("room {} created", room.id);
        Ok(room)
    }

    /// Delete a room. Refused while its ledger still holds bookings.
    pub async fn delete_room(&self, room_id: &str) -> Result<RoomInfo, EngineError> {
        let ledger = self.ensure_ledger(room_id)?;
        let mut guard = ledger.write().await;
        if guard.is_retired() {
            return Err(EngineError::RoomNotFound(room_id.to_string()));
        }
        if !guard.is_empty() {
            return Err(EngineError::RoomNotEmpty(room_id.to_string()));
        }

        let room = self
            .rooms
            .remove(room_id)
            .ok_or_else(|| EngineError::RoomNotFound(room_id.to_string()))?;
        guard.retire();
        self.ledgers
            .remove_if(room_id, |_, existing| Arc::ptr_eq(existing, &ledger));
        drop(guard);

        metrics::gauge!(observability::ROOMS_ACTIVE).set(self.rooms.len() as f64);
        debug!("room {room_id} deleted");
        Ok(room)
    }

    /// Reserve `[start, end)` on a room, reading the clock once for this call.
    pub async fn reserve(&self, room_id: &str, start: Micros, end: Micros) -> Result<Interval, EngineError> {
        self.reserve_at(room_id, start, end, now_us()).await
    }

    /// `reserve` with an explicit "now".
    pub async fn reserve_at(
        &self,
        room_id: &str,
        start: Micros,
        end: Micros,
        now: Micros,
    ) -> Result<Interval, EngineError> {
        let ledger = self.ensure_ledger(room_id)?;
        let mut guard = ledger.write().await;
        if guard.is_retired() {
            return Err(EngineError::RoomNotFound(room_id.to_string()));
        }

        match guard.try_reserve(start, end, now) {
            Ok(interval) => {
                metrics::counter!(observability::BOOKINGS_CREATED_TOTAL).increment(1);
                debug!("booking {} reserved on {room_id}", interval.id);
                Ok(interval)
            }
            Err(e) => {
                if let EngineError::Conflict(other) = e {
                    metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL).increment(1);
                    debug!("booking on {room_id} rejected: overlaps {other}");
                }
                Err(e)
            }
        }
    }

    pub async fn cancel(&self, room_id: &str, booking_id: Ulid) -> Result<Interval, EngineError> {
        let ledger = self.ensure_ledger(room_id)?;
        let mut guard = ledger.write().await;
        if guard.is_retired() {
            return Err(EngineError::RoomNotFound(room_id.to_string()));
        }
        let interval = guard.cancel(booking_id)?;
        metrics::counter!(observability::BOOKINGS_CANCELLED_TOTAL).increment(1);
        debug!("booking {booking_id} cancelled on {room_id}");
        Ok(interval)
    }
}
