//! Error taxonomy for the scanning core.
//!
//! Transient hardware and model failures are absorbed at the tick loop
//! (the tick is skipped or detection degrades to empty); persistence
//! failures drop the event rather than leave a partial record.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    /// The signal source failed for this tick; prior values are kept.
    #[error("signal source unavailable: {0}")]
    SignalUnavailable(String),

    /// Frame capture or the vision model failed; the tick proceeds with
    /// no detections.
    #[error("detector unavailable: {0}")]
    DetectionUnavailable(String),

    /// A row or file write failed; the event is dropped, never
    /// partially recorded.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// One item of a retention pass failed; the pass continues.
    #[error("retention failure: {0}")]
    Retention(String),

    /// A malformed query parameter, surfaced to the caller as a
    /// validation error.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
}
