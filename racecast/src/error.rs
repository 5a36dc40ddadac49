//! Error types of the race tracking core.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading the race file, deriving team state or publishing events.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The configured stage sequence breaks a structural invariant.
    #[error("Invalid stage sequence: {0}")]
    InvalidStages(String),

    /// A domain value is out of range (pace, distance, rank, bib number, ...).
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// A column is absent from a race file row.
    #[error("Missing field {0} in race file row")]
    MissingField(String),

    /// A column is present but its content could not be converted.
    #[error("Invalid content {value:?} for field {field}")]
    InvalidField { field: String, value: String },

    /// The race file does not contain any usable row yet.
    #[error("Race file does not contain any team")]
    EmptyRaceFile,

    /// The race file could not be opened or read.
    #[error("Failed to read race file {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("Failed to decode race file: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unknown text encoding {0}")]
    UnknownEncoding(String),

    /// The route does not provide exactly one group of points per stage.
    #[error("Route has {groups} point groups but the race has {stages} stages")]
    RouteMismatch { groups: usize, stages: usize },

    /// The consumer side of the event queue is gone.
    #[error("Event queue is closed")]
    QueueClosed,
}

impl TrackerError {
    /// True for errors meaning the race file is not ready yet; the read is retried on the next
    /// poll instead of stopping the broadcast.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, TrackerError::EmptyRaceFile)
    }
}
