use ulid::Ulid;

use crate::model::{format_timestamp, Micros};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    InvalidRange { start: Micros, end: Micros },
    PastBooking { start: Micros, now: Micros },
    InvalidDuration(Micros),
    /// Carries the id of the booking the request collided with.
    Conflict(Ulid),
    RoomNotFound(String),
    NotFound(Ulid),
    AlreadyExists(String),
    RoomNotEmpty(String),
    LimitExceeded(&'static str),
}

/// Outcome class a transport renders an error as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    ClientError,
    NotFound,
    Conflict,
}

impl EngineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            EngineError::InvalidRange { .. }
            | EngineError::PastBooking { .. }
            | EngineError::InvalidDuration(_)
            | EngineError::RoomNotEmpty(_)
            | EngineError::LimitExceeded(_) => ErrorClass::ClientError,
            EngineError::RoomNotFound(_) | EngineError::NotFound(_) => ErrorClass::NotFound,
            EngineError::Conflict(_) | EngineError::AlreadyExists(_) => ErrorClass::Conflict,
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidRange { start, end } => write!(
                f,
                "start must be before end: [{}, {})",
                format_timestamp(*start),
                format_timestamp(*end)
            ),
            EngineError::PastBooking { start, now } => write!(
                f,
                "cannot book in the past: start {} is before now {}",
                format_timestamp(*start),
                format_timestamp(*now)
            ),
            EngineError::InvalidDuration(d) => {
                write!(f, "minimum duration must be positive, got {d}us")
            }
            EngineError::Conflict(id) => write!(f, "time slot overlaps with existing booking: {id}"),
            EngineError::RoomNotFound(id) => write!(f, "room '{id}' not found"),
            EngineError::NotFound(id) => write!(f, "booking not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "room already exists: {id}"),
            EngineError::RoomNotEmpty(id) => {
                write!(f, "cannot delete room '{id}' with existing bookings")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}
