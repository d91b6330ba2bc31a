use std::collections::HashMap;

use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::availability;
use super::conflict::{check_no_conflict, validate_span};
use super::EngineError;

/// Bookings of a single room: a start-ordered vector plus an id index.
///
/// Both views are mutated together under the caller's write lock; a failed
/// operation leaves them untouched.
#[derive(Debug)]
pub struct Ledger {
    room_id: String,
    /// Non-overlapping, sorted by `(start, end, id)`.
    intervals: Vec<Interval>,
    index: HashMap<Ulid, Span>,
    /// Set once the owning room is deleted. A retired ledger accepts no bookings.
    retired: bool,
}

impl Ledger {
    pub fn new(room_id: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            intervals: Vec::new(),
            index: HashMap::new(),
            retired: false,
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }

    pub(super) fn retire(&mut self) {
        self.retired = true;
    }

    pub fn get(&self, id: &Ulid) -> Option<Interval> {
        self.index.get(id).map(|span| Interval { span: *span, id: *id })
    }

    /// Snapshot of every booking in canonical order.
    pub fn list(&self) -> Vec<Interval> {
        self.intervals.clone()
    }

    /// Bookings whose span overlaps `query`, skipping everything that starts at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Interval> {
        let right_bound = self.intervals.partition_point(|i| i.span.start < query.end);
        self.intervals[..right_bound]
            .iter()
            .filter(move |i| i.span.overlaps(query))
    }

    /// Conflict-checked insert. `now` is the caller's single clock reading.
    pub fn try_reserve(&mut self, start: Micros, end: Micros, now: Micros) -> Result<Interval, EngineError> {
        let span = Span::try_new(start, end)?;
        if span.start < now {
            return Err(EngineError::PastBooking { start, now });
        }
        validate_span(&span)?;
        if self.intervals.len() >= MAX_BOOKINGS_PER_ROOM {
            return Err(EngineError::LimitExceeded("too many bookings on room"));
        }

        let pos = check_no_conflict(&self.intervals, &span)?;

        let mut id = Ulid::new();
        while self.index.contains_key(&id) {
            id = Ulid::new();
        }
        let interval = Interval { span, id };
        self.intervals.insert(pos, interval);
        self.index.insert(id, span);
        Ok(interval)
    }

    /// Remove a booking by id. A second cancel of the same id fails with `NotFound`.
    pub fn cancel(&mut self, id: Ulid) -> Result<Interval, EngineError> {
        let span = *self.index.get(&id).ok_or(EngineError::NotFound(id))?;
        let interval = Interval { span, id };
        let pos = self
            .intervals
            .binary_search(&interval)
            .map_err(|_| EngineError::NotFound(id))?;
        self.intervals.remove(pos);
        self.index.remove(&id);
        Ok(interval)
    }

    pub fn free_slots(
        &self,
        window_start: Micros,
        window_end: Micros,
        min_duration: Micros,
    ) -> Result<Vec<Span>, EngineError> {
        if window_start > window_end {
            return Err(EngineError::InvalidRange {
                start: window_start,
                end: window_end,
            });
        }
        if min_duration <= 0 {
            return Err(EngineError::InvalidDuration(min_duration));
        }
        if window_end.saturating_sub(window_start) > MAX_QUERY_WINDOW_US {
            return Err(EngineError::LimitExceeded("query window too wide"));
        }
        if window_start == window_end {
            return Ok(Vec::new());
        }

        let window = Span::new(window_start, window_end);
        Ok(availability::free_slots(
            self.overlapping(&window).map(|i| &i.span),
            window_start,
            window_end,
            min_duration,
        ))
    }

    /// Panics if the ordered view and the id index disagree or any two bookings overlap.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        assert_eq!(self.intervals.len(), self.index.len(), "index size mismatch");
        for interval in &self.intervals {
            assert_eq!(self.index.get(&interval.id), Some(&interval.span));
        }
        for pair in self.intervals.windows(2) {
            assert!(pair[0] < pair[1], "not in canonical order: {pair:?}");
            assert!(pair[0].span.end <= pair[1].span.start, "overlap: {pair:?}");
        }
    }
}
