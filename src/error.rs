//! Error type shared by every stage of the decode pipeline.
//!
//! Errors fall into three classes, and the acquisition loop treats each
//! differently:
//!
//! | Class | Variants | Loop policy |
//! |---|---|---|
//! | transport | `TruncatedRead`, `Transport` | reconnect and resume |
//! | frame | `InvalidFrameLength` | drop the frame, read the next header |
//! | precondition | `NotInitialized`, `MissingCalibration` | end the current mode |
//!
//! An unrecognised packet type is *not* an error: it decodes to
//! [`crate::types::PacketBody::Unknown`].

use thiserror::Error;

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, ExploreError>;

#[derive(Error, Debug)]
pub enum ExploreError {
    /// The byte source hit end-of-stream before delivering the requested
    /// number of bytes. This is the signal used to detect a lost link.
    #[error("truncated read: expected {expected} bytes, received {received}")]
    TruncatedRead { expected: usize, received: usize },

    /// The byte source reported an I/O failure.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The header's payload length is smaller than the timestamp it must contain.
    #[error("invalid frame length {payload_length} (minimum {minimum})")]
    InvalidFrameLength { payload_length: u16, minimum: u16 },

    /// The orientation estimator was asked to track before a reference frame
    /// was established.
    #[error("orientation estimator is not initialized")]
    NotInitialized,

    /// Tracking needs a magnetometer calibration set and none was supplied.
    #[error("no magnetometer calibration set loaded")]
    MissingCalibration,

    #[error("invalid filter configuration: {0}")]
    InvalidFilter(String),

    #[error("calibration data error: {0}")]
    Calibration(#[from] csv::Error),

    /// The reconnect collaborator gave up.
    #[error("reconnect failed: {0}")]
    ReconnectFailed(String),
}

impl ExploreError {
    /// `true` for failures that a fresh byte source can recover from.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::TruncatedRead { .. } | Self::Transport(_))
    }
}
