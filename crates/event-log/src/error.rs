use thiserror::Error;

use crate::{EventId, EventStatus, EventType};

/// Errors that can occur when interacting with the event log.
#[derive(Debug, Error)]
pub enum EventLogError {
    /// No event with this id exists.
    #[error("Order event not found: {0}")]
    NotFound(EventId),

    /// An event with this id was already appended.
    #[error("Order event already exists: {0}")]
    DuplicateEvent(EventId),

    /// The requested status change is not allowed.
    #[error("Order event {event_id} cannot move from {from} to {to}")]
    InvalidTransition {
        event_id: EventId,
        from: EventStatus,
        to: EventStatus,
    },

    /// The stored `event_type` column is not a known type.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// The stored `status` column is not a known status.
    #[error("Unknown event status: {0}")]
    UnknownStatus(String),

    /// The row was written by a newer payload schema than this binary reads.
    #[error("Unsupported payload schema version {found} (max supported {supported})")]
    UnsupportedSchema { found: i16, supported: i16 },

    /// A payload column required by the event type is empty.
    #[error("Event type {event_type} requires the {column} payload")]
    MissingPayload {
        event_type: EventType,
        column: &'static str,
    },

    /// The in-memory log was told to reject writes.
    #[error("Event log unavailable")]
    Unavailable,

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for event log operations.
pub type Result<T> = std::result::Result<T, EventLogError>;
