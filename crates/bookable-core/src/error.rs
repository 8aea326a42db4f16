//! Error types for booking operations.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{AllocationStatus, BookingStatus};

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("booking resource not found: {0}")]
    ResourceNotFound(String),

    #[error("booking not found: {0}")]
    BookingNotFound(String),

    #[error("allocation not found: {0}")]
    AllocationNotFound(String),

    /// Advisory lock could not be acquired within the timeout. Transient;
    /// callers should retry with backoff rather than fail the request.
    #[error("lock contended for key '{key}'")]
    LockContended { key: String },

    #[error("invalid allocation transition: {from} -> {to}")]
    InvalidTransition {
        from: AllocationStatus,
        to: AllocationStatus,
    },

    #[error("invalid booking transition: {from} -> {to}")]
    InvalidBookingTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("resource '{resource_id}' is not available from {start} to {end}")]
    WindowUnavailable {
        resource_id: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("resource '{0}' is not bookable")]
    NotBookable(String),

    #[error("booking requires at least one allocation")]
    EmptyBooking,
}

impl BookingError {
    /// Whether the failed operation may be retried with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BookingError::LockContended { .. })
    }
}

pub type Result<T> = std::result::Result<T, BookingError>;
