use crate::domain::booking::BookingStatus;
use thiserror::Error;

/// Error taxonomy for the booking engine.
///
/// Guard failures (`InvalidInterval`, `Conflict`, `InvalidTransition`,
/// `Forbidden`) are raised synchronously to the caller of the triggering
/// operation and never leave a partially applied transition behind.
/// `PaymentFailure` is retryable: it reports a provider problem without
/// invalidating the booking's lifecycle status.
#[derive(Error, Debug)]
pub enum BookingError {
    #[error("invalid interval: {0}")]
    InvalidInterval(String),
    #[error("booking conflict: {0}")]
    Conflict(String),
    #[error("cannot {action} a booking in status '{status}'")]
    InvalidTransition {
        action: &'static str,
        status: BookingStatus,
    },
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("payment failure: {0}")]
    PaymentFailure(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("storage error: {0}")]
    Storage(#[from] rocksdb::Error),
    #[error("internal error: {0}")]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, BookingError>;
