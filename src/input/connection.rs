// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! Source connection manager
//!
//! Owns the capture handle and turns every failure (open, probe, mid-stream
//! read) into the same recovery: release, wait the backoff, reopen.
//!
//! ```text
//! Disconnected ──▶ Connecting ──(open + probe ok)──▶ Connected
//!                    ▲    │                             │
//!            backoff │    └──(open / probe fails)──▶ Failed
//!                    └──────────────────────────────────┘
//! Connected ──(read fails)──▶ Disconnected
//! ```

use std::time::Duration;

use tracing::{debug, info, warn};

use super::{SourceId, VideoSource};
use crate::detection::Frame;
use crate::error::{ConnectError, ReadError};
use crate::timing::Sleeper;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// Token for a live connection; a reconnect invalidates older tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceHandle {
    generation: u64,
}

impl SourceHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

pub struct ConnectionManager<S: VideoSource> {
    source: S,
    source_id: SourceId,
    backoff: Duration,
    sleeper: Box<dyn Sleeper>,

    state: ConnectionState,
    handle: Option<S::Handle>,
    generation: u64,
    probe_frame: Option<Frame>, // frame read while probing, handed out first
    attempts: u32,              // consecutive failed connects

    #[cfg(test)]
    history: Vec<ConnectionState>,
}

impl<S: VideoSource> ConnectionManager<S> {
    pub fn new(source: S, source_id: SourceId, backoff: Duration, sleeper: Box<dyn Sleeper>) -> Self {
        Self {
            source,
            source_id,
            backoff,
            sleeper,
            state: ConnectionState::Disconnected,
            handle: None,
            generation: 0,
            probe_frame: None,
            attempts: 0,
            #[cfg(test)]
            history: vec![ConnectionState::Disconnected],
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn source_id(&self) -> &SourceId {
        &self.source_id
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Current handle, opening the source if needed.
    ///
    /// On failure the backoff has already been slept when this returns, so
    /// the caller simply tries again.
    pub fn ensure_connected(&mut self) -> Result<SourceHandle, ConnectError> {
        if self.state == ConnectionState::Connected && self.handle.is_some() {
            return Ok(SourceHandle {
                generation: self.generation,
            });
        }

        self.transition(ConnectionState::Connecting);
        if self.attempts == 0 {
            info!("📹 connecting to {}...", self.source_id);
        } else {
            info!("🔄 reconnecting to {} (attempt {})...", self.source_id, self.attempts + 1);
        }

        match self.open_and_probe() {
            Ok((handle, frame)) => {
                self.generation += 1;
                self.handle = Some(handle);
                self.probe_frame = Some(frame);
                self.attempts = 0;
                self.transition(ConnectionState::Connected);
                info!("✅ connected to {}, detection running", self.source_id);
                Ok(SourceHandle {
                    generation: self.generation,
                })
            }
            Err(reason) => {
                self.attempts += 1;
                self.transition(ConnectionState::Failed);
                warn!(
                    "❌ cannot open {}: {} - retrying in {:.1}s",
                    self.source_id,
                    reason,
                    self.backoff.as_secs_f64()
                );
                self.sleeper.sleep(self.backoff);
                self.transition(ConnectionState::Connecting);
                Err(ConnectError {
                    source_id: self.source_id.to_string(),
                    attempt: self.attempts,
                    reason,
                })
            }
        }
    }

    fn open_and_probe(&mut self) -> Result<(S::Handle, Frame), String> {
        let mut handle = self
            .source
            .open(&self.source_id)
            .map_err(|e| format!("open failed: {:#}", e))?;

        match self.source.read(&mut handle) {
            Ok(frame) => Ok((handle, frame)),
            Err(e) => {
                self.source.release(handle);
                Err(format!("probe read failed: {:#}", e))
            }
        }
    }

    /// Next frame of the live connection; a failed read drops the connection
    pub fn read_frame(&mut self, handle: SourceHandle) -> Result<Frame, ReadError> {
        let live = match (&self.state, &self.handle) {
            (ConnectionState::Connected, Some(_)) => Some(self.generation),
            _ => None,
        };
        if live != Some(handle.generation) {
            return Err(ReadError::StaleHandle {
                given: handle.generation,
                current: live,
            });
        }

        if let Some(frame) = self.probe_frame.take() {
            return Ok(frame);
        }

        let Some(h) = self.handle.as_mut() else {
            return Err(ReadError::StaleHandle {
                given: handle.generation,
                current: None,
            });
        };
        let result = self.source.read(h);
        result.map_err(|e| {
            warn!("⚠️ frame read from {} failed: {:#} - reconnecting", self.source_id, e);
            self.release();
            ReadError::Stream(format!("{:#}", e))
        })
    }

    /// Release the handle if any; safe to call repeatedly
    pub fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.source.release(handle);
            debug!("handle for {} released", self.source_id);
        }
        self.probe_frame = None;
        if self.state != ConnectionState::Disconnected {
            self.transition(ConnectionState::Disconnected);
        }
    }

    /// Forced release followed by the backoff wait (unexpected-error path)
    pub fn release_and_backoff(&mut self) {
        self.release();
        info!("⏳ retrying in {:.1}s", self.backoff.as_secs_f64());
        self.sleeper.sleep(self.backoff);
    }

    fn transition(&mut self, next: ConnectionState) {
        debug!("connection {:?} -> {:?}", self.state, next);
        self.state = next;
        #[cfg(test)]
        self.history.push(next);
    }

    #[cfg(test)]
    pub(crate) fn history(&self) -> &[ConnectionState] {
        &self.history
    }

    #[cfg(test)]
    pub(crate) fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

impl<S: VideoSource> Drop for ConnectionManager<S> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.source.release(handle);
        }
    }
}
