//! Error taxonomy for the detection pipeline.
//!
//! Three failure classes with different blast radii:
//! - `SourceError` is fatal and surfaces before a session enters RUNNING.
//! - `DetectError` is soft: one bad frame is logged and skipped, the stream
//!   continues. One malformed frame must never kill a live camera session.
//! - `ControllerError` is caller misuse and changes no session state.

use thiserror::Error;

/// Fatal frame-source failures. Raised at open time, never mid-stream.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The backing file or directory is missing or cannot be decoded.
    #[error("source not found: {0}")]
    NotFound(String),
    /// The capture handle (camera, video stream) cannot be opened.
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// Soft per-frame detection failures.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("inference failed: {0}")]
    InferenceFailed(String),
}

/// Session controller misuse.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("a session is already running on this controller")]
    AlreadyRunning,
}

/// Fatal session failures returned by `SessionController::start`.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Controller(#[from] ControllerError),
    #[error("sink rejected frame: {0}")]
    Sink(String),
}
