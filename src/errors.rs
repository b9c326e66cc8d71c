/// Error types for the CSMA/CA medium-access core.
///
/// Transient failures (CRC mismatch, timeout) are resolved entirely by
/// the CSMA/CA backoff loop and never surface as a `SimError` at all.
/// Semantic failures (unknown station, duplicate creation) are logged
/// at their call site using this type's `Display` impl rather than
/// propagated, since a malformed or stale task from the dispatcher's
/// queue should never take the run down. What's left — resource
/// exhaustion and the retry counter's hard cap — are the failures that
/// legitimately cross a worker boundary.
use thiserror::Error;

use crate::contracts::StationName;

/// Result type alias for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, SimError>;

/// Failure modes that cross an API boundary.
#[derive(Debug, Error)]
pub enum SimError {
    /// CRC over the frame bytes did not match the trailing FCS.
    #[error("checksum validation failed")]
    ChecksumMismatch,

    /// A medium read did not observe the requested bytes before its
    /// deadline elapsed.
    #[error("medium read timed out")]
    TimedOut,

    /// A task referenced a station name not present in the station
    /// table: a `send` from an unknown or already-killed source, or a
    /// `kill` of a station that was never created.
    #[error("Unknown Station {0}")]
    UnknownStation(StationName),

    /// A station name handed in at the task-ingestion boundary was
    /// empty or longer than the 6-byte address field.
    #[error("station name must be 1-6 bytes, got {0:?}")]
    InvalidStationName(String),

    /// `CreateStation` named a station that already exists; logged and
    /// treated as a no-op by the dispatcher, never propagated further.
    #[error("Station {0} already exists")]
    DuplicateStation(StationName),

    /// The send job's retry counter reached K_MAX without a successful
    /// exchange.
    #[error("Number of attempts exceeded 32")]
    MaxRetriesExceeded,

    /// A DATA payload would not fit the wire format's length field.
    #[error("payload of {0} bytes exceeds the maximum of {1}")]
    PayloadTooLarge(usize, usize),

    /// Failed to allocate a medium, spawn a worker, or open the log
    /// directory. Fatal: the run aborts.
    #[error("resource exhaustion: {0}")]
    ResourceExhausted(String),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
