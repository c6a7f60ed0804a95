// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// Alert sound dispatch
///
/// ```text
/// maybe_dispatch(triggered, now)
///   ├─ reap finished playback (non-blocking)
///   ├─ !triggered            → skip
///   ├─ playback in flight    → skip
///   ├─ now - last <= cooldown → skip
///   └─ last = now, spawn playback thread ──▶ completion channel
/// ```
/// At most one playback thread is alive at any time. The thread is detached:
/// the watch loop never waits on it except for the bounded wait at shutdown.
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use tracing::{debug, info, warn};

use crate::error::PlaybackError;
use crate::gen_time_string;

/// Blocking sound playback, called on the playback thread
pub trait SoundPlayer: Send + Sync {
    fn play(&self, sound: &Path) -> Result<(), PlaybackError>;
}

/// Plays the sound through an external command (`ffplay` by default)
#[derive(Debug, Clone)]
pub struct CommandPlayer {
    program: String,
    args: Vec<String>,
}

impl CommandPlayer {
    /// `ffplay` gets `-nodisp -autoexit`; other players get the file only
    pub fn new(program: impl Into<String>) -> Self {
        let program = program.into();
        let is_ffplay = Path::new(&program)
            .file_stem()
            .map(|s| s == "ffplay")
            .unwrap_or(false);
        let args = if is_ffplay {
            ["-nodisp", "-autoexit", "-loglevel", "error"]
                .iter()
                .map(|s| s.to_string())
                .collect()
        } else {
            vec![]
        };
        Self { program, args }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl SoundPlayer for CommandPlayer {
    fn play(&self, sound: &Path) -> Result<(), PlaybackError> {
        if !sound.is_file() {
            return Err(PlaybackError::MissingFile(sound.to_path_buf()));
        }
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(sound)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        if !status.success() {
            return Err(PlaybackError::PlayerFailed {
                program: self.program.clone(),
                status: status.to_string(),
            });
        }
        Ok(())
    }
}

/// Running playback thread
struct InFlight {
    done: Receiver<Result<(), PlaybackError>>,
    worker: JoinHandle<()>,
}

/// Cooldown-gated, single-flight alert sound
pub struct AlertDispatcher {
    player: Arc<dyn SoundPlayer>,
    sound: PathBuf,
    cooldown: Duration,
    last_alert_time: Option<Instant>, // None = never alerted
    in_flight: Option<InFlight>,
    dispatched: u64,
}

impl AlertDispatcher {
    pub fn new(player: Arc<dyn SoundPlayer>, sound: impl Into<PathBuf>, cooldown: Duration) -> Self {
        Self {
            player,
            sound: sound.into(),
            cooldown,
            last_alert_time: None,
            in_flight: None,
            dispatched: 0,
        }
    }

    /// Start playback if the alert is due; returns whether playback started
    pub fn maybe_dispatch(&mut self, alert_triggered: bool, now: Instant) -> bool {
        self.reap();

        if !alert_triggered {
            return false;
        }
        if self.in_flight.is_some() {
            debug!("🔇 alert suppressed: playback still running");
            return false;
        }
        if let Some(last) = self.last_alert_time {
            if now.saturating_duration_since(last) <= self.cooldown {
                debug!("🔇 alert suppressed: cooldown");
                return false;
            }
        }

        self.last_alert_time = Some(now);

        let (tx, rx) = crossbeam_channel::bounded(1);
        let player = Arc::clone(&self.player);
        let sound = self.sound.clone();
        let spawned = thread::Builder::new()
            .name("alert-playback".to_string())
            .spawn(move || {
                let _ = tx.send(player.play(&sound));
            });

        match spawned {
            Ok(worker) => {
                self.in_flight = Some(InFlight { done: rx, worker });
                self.dispatched += 1;
                info!(
                    "🚨 [{}] alert #{}: playing {}",
                    gen_time_string(":"),
                    self.dispatched,
                    self.sound.display()
                );
                true
            }
            Err(e) => {
                warn!("⚠️ failed to start playback thread: {}", e);
                false
            }
        }
    }

    /// Collect a finished playback without blocking
    fn reap(&mut self) {
        let Some(flight) = &self.in_flight else {
            return;
        };
        match flight.done.try_recv() {
            Ok(result) => self.finish(result),
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => self.finish(Err(PlaybackError::WorkerLost)),
        }
    }

    fn finish(&mut self, result: Result<(), PlaybackError>) {
        if let Some(flight) = self.in_flight.take() {
            // the worker has already sent (or died), join returns promptly
            let _ = flight.worker.join();
        }
        match result {
            Ok(()) => debug!("🔈 alert playback finished"),
            Err(e) => warn!("⚠️ alert playback failed: {}", e),
        }
    }

    /// Wait up to `timeout` for the running playback.
    ///
    /// Returns `true` when nothing is in flight afterwards. On timeout the
    /// thread is left detached.
    pub fn wait_for_playback(&mut self, timeout: Duration) -> bool {
        let Some(flight) = &self.in_flight else {
            return true;
        };
        match flight.done.recv_timeout(timeout) {
            Ok(result) => {
                self.finish(result);
                true
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.finish(Err(PlaybackError::WorkerLost));
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "⏱️ alert playback still running after {:?}, leaving it detached",
                    timeout
                );
                false
            }
        }
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn last_alert_time(&self) -> Option<Instant> {
        self.last_alert_time
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use crossbeam_channel::{Receiver, Sender};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Player that blocks until the test opens the gate
    pub struct GatedPlayer {
        gate: Receiver<()>,
        pub plays: AtomicUsize,
    }

    impl GatedPlayer {
        pub fn new() -> (Arc<Self>, Sender<()>) {
            let (tx, rx) = crossbeam_channel::unbounded();
            (
                Arc::new(Self {
                    gate: rx,
                    plays: AtomicUsize::new(0),
                }),
                tx,
            )
        }
    }

    impl SoundPlayer for GatedPlayer {
        fn play(&self, _sound: &Path) -> Result<(), PlaybackError> {
            self.plays.fetch_add(1, Ordering::SeqCst);
            let _ = self.gate.recv();
            Ok(())
        }
    }

    /// Player that finishes immediately
    #[derive(Default)]
    pub struct InstantPlayer {
        pub plays: AtomicUsize,
        pub fail: bool,
    }

    impl SoundPlayer for InstantPlayer {
        fn play(&self, sound: &Path) -> Result<(), PlaybackError> {
            self.plays.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PlaybackError::MissingFile(sound.to_path_buf()));
            }
            Ok(())
        }
    }
}
