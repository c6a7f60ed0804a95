// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! Error types of the watch loop
//!
//! Everything raised inside the per-frame cycle is recoverable; only
//! [`StartupError`] is allowed to end the process.

use std::path::PathBuf;

use thiserror::Error;

/// The source could not be opened or probed. Always retryable.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("source {source_id} unavailable (attempt {attempt}): {reason}")]
pub struct ConnectError {
    pub source_id: String,
    pub attempt: u32,
    pub reason: String,
}

/// A frame read failed mid-stream; the handle has been released.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReadError {
    #[error("frame read failed, reconnect needed: {0}")]
    Stream(String),

    #[error("stale source handle (generation {given}, current {current:?})")]
    StaleHandle { given: u64, current: Option<u64> },
}

/// Alert sound could not be played. Recovered inside the dispatcher.
#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("alert sound file not found: {0}")]
    MissingFile(PathBuf),

    #[error("player `{program}` exited with {status}")]
    PlayerFailed { program: String, status: String },

    #[error("failed to launch player: {0}")]
    Io(#[from] std::io::Error),

    #[error("playback worker stopped without reporting")]
    WorkerLost,
}

/// Fatal errors before the first frame is processed
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("model loading failed: {0}")]
    ModelLoad(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl StartupError {
    pub fn model_load<S: Into<String>>(msg: S) -> Self {
        Self::ModelLoad(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }
}
