use crate::model::Micros;

const MICROS_PER_DAY: Micros = 86_400_000_000;

pub const MAX_ROOMS: usize = 10_000;
pub const MAX_BOOKINGS_PER_ROOM: usize = 100_000;
pub const MAX_ROOM_ID_LEN: usize = 128;
pub const MAX_ROOM_NAME_LEN: usize = 256;
pub const MAX_DESCRIPTION_LEN: usize = 4096;

/// 1970-01-01T00:00:00Z
pub const MIN_VALID_TIMESTAMP_US: Micros = 0;
/// 9999-12-31T23:59:59Z
pub const MAX_VALID_TIMESTAMP_US: Micros = 253_402_300_799_000_000;

/// A single booking may not exceed one year.
pub const MAX_SPAN_DURATION_US: Micros = 366 * MICROS_PER_DAY;
/// Free-slot searches are capped at two years of window.
pub const MAX_QUERY_WINDOW_US: Micros = 2 * 366 * MICROS_PER_DAY;
