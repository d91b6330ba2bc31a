use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::engine::EngineError;

/// Unix microseconds, UTC. The only time type in the engine.
pub type Micros = i64;

pub const MICROS_PER_MINUTE: Micros = 60_000_000;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Micros,
    pub end: Micros,
}

impl Span {
    pub fn new(start: Micros, end: Micros) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// Checked constructor for untrusted input. Zero-length spans are rejected.
    pub fn try_new(start: Micros, end: Micros) -> Result<Self, EngineError> {
        if start < end {
            Ok(Self { start, end })
        } else {
            Err(EngineError::InvalidRange { start, end })
        }
    }

    pub fn duration(&self) -> Micros {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A single reservation held by a ledger.
///
/// Field order matters: the derived `Ord` sorts by `(start, end, id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub span: Span,
    pub id: Ulid,
}

impl Interval {
    pub fn start(&self) -> Micros {
        self.span.start
    }

    pub fn end(&self) -> Micros {
        self.span.end
    }
}

// ── Directory / query result types ───────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub id: String,
    pub name: String,
    pub capacity: Option<u32>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingInfo {
    pub id: Ulid,
    pub room_id: String,
    pub start: Micros,
    pub end: Micros,
}

impl BookingInfo {
    pub fn new(room_id: &str, interval: &Interval) -> Self {
        Self {
            id: interval.id,
            room_id: room_id.to_string(),
            start: interval.span.start,
            end: interval.span.end,
        }
    }
}

// ── Timestamp text conversions ───────────────────────────────────

/// Parse an ISO-8601 timestamp. Offsets are normalized to UTC; naive values are taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<Micros> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).timestamp_micros());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc().timestamp_micros());
        }
    }
    None
}

/// RFC 3339 in UTC with microsecond precision, e.g. `2030-01-01T09:00:00.000000Z`.
pub fn format_timestamp(t: Micros) -> String {
    match DateTime::<Utc>::from_timestamp_micros(t) {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Micros, true),
        None => t.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_basics() {
        let s = Span::new(100, 200);
        assert_eq!(s.duration(), 100);
    }

    #[test]
    fn span_overlap() {
        let a = Span::new(100, 200);
        let b = Span::new(150, 250);
        let c = Span::new(200, 300);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c)); // adjacent, not overlapping
    }

    #[test]
    fn span_try_new_rejects_empty_and_inverted() {
        assert!(Span::try_new(100, 200).is_ok());
        assert!(matches!(
            Span::try_new(200, 200),
            Err(EngineError::InvalidRange { start: 200, end: 200 })
        ));
        assert!(matches!(
            Span::try_new(300, 200),
            Err(EngineError::InvalidRange { .. })
        ));
    }

    #[test]
    fn interval_orders_by_start_end_then_id() {
        let lo = Ulid::from_parts(1, 1);
        let hi = Ulid::from_parts(1, 2);
        let a = Interval { span: Span::new(100, 200), id: hi };
        let b = Interval { span: Span::new(100, 300), id: lo };
        let c = Interval { span: Span::new(100, 200), id: lo };
        let d = Interval { span: Span::new(50, 400), id: hi };

        let mut v = vec![a, b, c, d];
        v.sort();
        assert_eq!(v, vec![d, c, a, b]);
    }

    #[test]
    fn parse_rfc3339_with_offset() {
        let t = parse_timestamp("2030-01-01T10:00:00+02:00").unwrap();
        assert_eq!(t, parse_timestamp("2030-01-01T08:00:00Z").unwrap());
    }

    #[test]
    fn parse_naive_is_utc_and_keeps_micros() {
        let a = parse_timestamp("2030-01-01T08:00:00.123456").unwrap();
        let b = parse_timestamp("2030-01-01T08:00:00Z").unwrap();
        assert_eq!(a - b, 123_456);
    }

    #[test]
    fn parse_garbage_is_none() {
        assert_eq!(parse_timestamp("tomorrow at noon"), None);
    }

    #[test]
    fn format_roundtrips_through_parse() {
        let t = parse_timestamp("2030-06-15T12:34:56.789012Z").unwrap();
        let s = format_timestamp(t);
        assert_eq!(s, "2030-06-15T12:34:56.789012Z");
        assert_eq!(parse_timestamp(&s), Some(t));
    }

    #[test]
    fn interval_serializes_with_span_and_id() {
        let interval = Interval {
            span: Span::new(1, 2),
            id: Ulid::nil(),
        };
        let json = serde_json::to_value(interval).unwrap();
        assert_eq!(json["span"]["start"], 1);
        assert_eq!(json["span"]["end"], 2);
        assert!(json["id"].is_string());
    }
}
