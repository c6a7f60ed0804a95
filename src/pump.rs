// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// Frame pump: the watch loop
///
/// ```text
/// step():
///   ensure_connected ──err──▶ return (backoff already slept)
///   read_frame       ──err──▶ return (connection dropped, reconnect next step)
///   infer ─▶ filter ─▶ render ─▶ maybe_dispatch ─▶ show ─▶ poll_key
///     └──err──▶ log, release source, backoff, return
/// ```
/// `q` / `Q` / Esc switch the loop to `Terminating`; `shutdown` then releases
/// the source, closes the display and waits (bounded) for playback.
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, error, info};

use crate::alert::AlertDispatcher;
use crate::detection::{DetectionFilter, Frame};
use crate::display::{Display, KEY_ESCAPE};
use crate::input::{ConnectionManager, VideoSource};
use crate::models::ObjectDetector;
use crate::renderer::OverlayRenderer;
use crate::timing::Clock;

const STATS_EVERY: u64 = 100; // frames between throughput lines
const SHUTDOWN_WAIT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Terminating,
}

/// Counters of the watch loop
#[derive(Debug, Clone, Default)]
pub struct PumpStats {
    pub frames: u64,
    pub alerts: u64,
    pub reconnects: u64,
    pub recovered_errors: u64,
}

pub fn is_exit_key(key: char) -> bool {
    matches!(key, 'q' | 'Q' | KEY_ESCAPE)
}

pub struct FramePump<S: VideoSource> {
    connection: ConnectionManager<S>,
    detector: Box<dyn ObjectDetector>,
    filter: DetectionFilter,
    renderer: OverlayRenderer,
    dispatcher: AlertDispatcher,
    clock: Box<dyn Clock>,
    window: String,

    state: LoopState,
    stats: PumpStats,
    generation: u64,          // last connection generation seen
    stats_since: Option<Instant>, // start of the current throughput window
    shutdown_wait: Duration,
}

impl<S: VideoSource> FramePump<S> {
    pub fn new(
        connection: ConnectionManager<S>,
        detector: Box<dyn ObjectDetector>,
        filter: DetectionFilter,
        renderer: OverlayRenderer,
        dispatcher: AlertDispatcher,
        clock: Box<dyn Clock>,
        window: impl Into<String>,
    ) -> Self {
        Self {
            connection,
            detector,
            filter,
            renderer,
            dispatcher,
            clock,
            window: window.into(),
            state: LoopState::Running,
            stats: PumpStats::default(),
            generation: 0,
            stats_since: None,
            shutdown_wait: SHUTDOWN_WAIT,
        }
    }

    pub fn with_shutdown_wait(mut self, wait: Duration) -> Self {
        self.shutdown_wait = wait;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> &PumpStats {
        &self.stats
    }

    pub fn dispatcher(&self) -> &AlertDispatcher {
        &self.dispatcher
    }

    /// Ask the loop to terminate after the current step
    pub fn stop(&mut self) {
        self.state = LoopState::Terminating;
    }

    /// One loop iteration
    pub fn step(&mut self, display: &mut dyn Display) -> LoopState {
        if self.state == LoopState::Terminating {
            return self.state;
        }

        let handle = match self.connection.ensure_connected() {
            Ok(handle) => handle,
            Err(e) => {
                debug!("{}", e);
                self.poll_exit(display);
                return self.state;
            }
        };
        if handle.generation() != self.generation {
            if self.generation != 0 {
                self.stats.reconnects += 1;
            }
            self.generation = handle.generation();
        }

        let frame = match self.connection.read_frame(handle) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("{}", e);
                self.poll_exit(display);
                return self.state;
            }
        };

        if let Err(e) = self.process(frame, display) {
            error!("❌ {:#} - resetting source", e);
            self.stats.recovered_errors += 1;
            self.connection.release_and_backoff();
        }
        self.state
    }

    fn process(&mut self, mut frame: Frame, display: &mut dyn Display) -> Result<()> {
        let raw = self
            .detector
            .infer(&frame)
            .with_context(|| format!("{} inference failed", self.detector.name()))?;

        let outcome = self.filter.apply(&raw);
        self.renderer.render(
            &mut frame,
            &outcome.kept,
            self.filter.target_classes(),
            outcome.alert_triggered,
            self.filter.alert_class(),
        );

        if self
            .dispatcher
            .maybe_dispatch(outcome.alert_triggered, self.clock.now())
        {
            self.stats.alerts += 1;
        }

        display
            .show(&self.window, &frame)
            .context("display failed")?;
        self.poll_exit(display);

        self.stats.frames += 1;
        self.log_stats();
        Ok(())
    }

    fn poll_exit(&mut self, display: &mut dyn Display) {
        if let Some(key) = display.poll_key() {
            if is_exit_key(key) {
                info!("⏹️ exit key pressed");
                self.state = LoopState::Terminating;
            }
        }
    }

    fn log_stats(&mut self) {
        let now = self.clock.now();
        let since = *self.stats_since.get_or_insert(now);
        if self.stats.frames % STATS_EVERY != 0 {
            return;
        }
        let elapsed = now.saturating_duration_since(since).as_secs_f64();
        let fps = if elapsed > 0.0 {
            STATS_EVERY as f64 / elapsed
        } else {
            0.0
        };
        info!(
            "📊 frames: {} | FPS: {:.1} | alerts: {} | reconnects: {} | recovered errors: {}",
            self.stats.frames,
            fps,
            self.stats.alerts,
            self.stats.reconnects,
            self.stats.recovered_errors
        );
        self.stats_since = Some(now);
    }

    /// Step until an exit key is pressed, then shut down
    pub fn run(&mut self, display: &mut dyn Display) {
        info!("🚀 watch loop started ('q' or Esc to quit)");
        while self.step(display) == LoopState::Running {}
        self.shutdown(display);
    }

    pub fn shutdown(&mut self, display: &mut dyn Display) {
        self.state = LoopState::Terminating;
        self.connection.release();
        display.close();
        self.dispatcher.wait_for_playback(self.shutdown_wait);
        info!(
            "👋 stopped after {} frames, {} alerts, {} reconnects",
            self.stats.frames, self.stats.alerts, self.stats.reconnects
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::fakes::InstantPlayer;
    use crate::config::TargetClasses;
    use crate::detection::{BBox, Detection};
    use crate::display::fakes::ScriptedDisplay;
    use crate::input::connection::fakes::ScriptedSource;
    use crate::input::{ConnectionState, SourceId};
    use crate::models::fakes::ScriptedDetector;
    use crate::timing::fakes::{ManualClock, RecordingSleeper};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    struct Harness {
        pump: FramePump<ScriptedSource>,
        display: ScriptedDisplay,
        clock: ManualClock,
        sleeper: RecordingSleeper,
        player: Arc<InstantPlayer>,
    }

    fn harness(source: ScriptedSource, detector: ScriptedDetector) -> Harness {
        let sleeper = RecordingSleeper::default();
        let clock = ManualClock::new();
        let player = Arc::new(InstantPlayer::default());
        let connection = ConnectionManager::new(
            source,
            SourceId::Device(0),
            Duration::from_secs(5),
            Box::new(sleeper.clone()),
        );
        let pump = FramePump::new(
            connection,
            Box::new(detector),
            DetectionFilter::new(0.5, TargetClasses::default(), "bear"),
            OverlayRenderer::without_font(),
            AlertDispatcher::new(player.clone(), "alert.mp3", Duration::from_secs(5)),
            Box::new(clock.clone()),
            "test",
        );
        Harness {
            pump,
            display: ScriptedDisplay::default(),
            clock,
            sleeper,
            player,
        }
    }

    fn bear() -> Detection {
        Detection::new("bear", 0.9, BBox::new(10., 10., 50., 50.))
    }

    #[test]
    fn test_single_bear_frame_dispatches_once() {
        let mut detector = ScriptedDetector::default();
        for dets in [vec![], vec![], vec![], vec![bear()], vec![], vec![]] {
            detector.push(dets);
        }
        let mut h = harness(ScriptedSource::with_frames(6), detector);

        for _ in 0..6 {
            assert_eq!(h.pump.step(&mut h.display), LoopState::Running);
            h.clock.advance(Duration::from_millis(100));
        }

        assert_eq!(h.display.shown.len(), 6);
        assert_eq!(h.pump.stats().frames, 6);
        assert_eq!(h.pump.stats().alerts, 1);
        assert!(h.pump.dispatcher.wait_for_playback(Duration::from_secs(5)));
        assert_eq!(h.player.plays.load(Ordering::SeqCst), 1);
        // the bear frame got a red box
        assert_eq!(*h.display.shown[3].get_pixel(10, 20), image::Rgb([255, 0, 0]));
    }

    #[test]
    fn test_bear_every_frame_within_cooldown_dispatches_once() {
        let mut detector = ScriptedDetector::default();
        for _ in 0..10 {
            detector.push(vec![bear()]);
        }
        let mut h = harness(ScriptedSource::with_frames(10), detector);

        for _ in 0..10 {
            h.pump.step(&mut h.display);
            h.pump.dispatcher.wait_for_playback(Duration::from_secs(5));
            h.clock.advance(Duration::from_millis(100));
        }
        assert_eq!(h.pump.stats().alerts, 1);
    }

    #[test]
    fn test_open_fails_twice_then_recovers() {
        let mut source = ScriptedSource::with_frames(1);
        source.opens.extend([false, false]);
        let mut h = harness(source, ScriptedDetector::default());

        h.pump.step(&mut h.display);
        h.pump.step(&mut h.display);
        assert_eq!(h.sleeper.calls.get(), 2);
        assert!(h.display.shown.is_empty());

        h.pump.step(&mut h.display);
        assert_eq!(h.sleeper.calls.get(), 2);
        assert_eq!(h.display.shown.len(), 1);
        assert_eq!(h.pump.connection.state(), ConnectionState::Connected);
        assert_eq!(h.pump.connection.source_mut().open_calls, 3);
    }

    #[test]
    fn test_inference_error_resets_source() {
        let mut detector = ScriptedDetector::default();
        detector.push_err("CUDA out of memory");
        let mut h = harness(ScriptedSource::with_frames(3), detector);

        h.pump.step(&mut h.display);
        assert_eq!(h.pump.stats().recovered_errors, 1);
        assert_eq!(h.sleeper.calls.get(), 1);
        assert_eq!(h.pump.connection.state(), ConnectionState::Disconnected);
        assert!(h.display.shown.is_empty());

        h.pump.step(&mut h.display);
        assert_eq!(h.display.shown.len(), 1);
        assert_eq!(h.pump.stats().reconnects, 1);
        assert_eq!(h.pump.state(), LoopState::Running);
    }

    #[test]
    fn test_display_error_resets_source() {
        let mut h = harness(ScriptedSource::with_frames(3), ScriptedDetector::default());
        h.display.fail_next_show = true;

        h.pump.step(&mut h.display);
        assert_eq!(h.pump.stats().recovered_errors, 1);
        assert_eq!(h.pump.connection.source_mut().released, vec![1]);

        h.pump.step(&mut h.display);
        assert_eq!(h.display.shown.len(), 1);
    }

    #[test]
    fn test_read_failure_reconnects_without_backoff() {
        let mut h = harness(ScriptedSource::with_frames(2), ScriptedDetector::default());
        h.pump.connection.source_mut().reads.insert(1, crate::input::connection::fakes::Step::Fail);

        h.pump.step(&mut h.display); // probe frame
        h.pump.step(&mut h.display); // read fails
        assert_eq!(h.pump.connection.state(), ConnectionState::Disconnected);
        assert_eq!(h.sleeper.calls.get(), 0);
        assert_eq!(h.pump.stats().recovered_errors, 0);

        h.pump.step(&mut h.display); // reopen, probe gets the last frame
        assert_eq!(h.display.shown.len(), 2);
        assert_eq!(h.pump.stats().reconnects, 1);
    }

    #[test]
    fn test_exit_keys() {
        assert!(is_exit_key('q'));
        assert!(is_exit_key('Q'));
        assert!(is_exit_key('\u{1b}'));
        assert!(!is_exit_key('w'));
    }

    #[test]
    fn test_exit_key_terminates_and_releases() {
        let mut h = harness(ScriptedSource::with_frames(5), ScriptedDetector::default());
        h.display.keys.extend([None, Some('x'), Some('q')]);

        h.pump.run(&mut h.display);

        assert_eq!(h.pump.state(), LoopState::Terminating);
        assert_eq!(h.display.shown.len(), 3);
        assert!(h.display.closed);
        assert_eq!(h.pump.connection.state(), ConnectionState::Disconnected);
        assert_eq!(h.pump.connection.source_mut().released, vec![1]);

        // terminated pump does nothing
        assert_eq!(h.pump.step(&mut h.display), LoopState::Terminating);
        assert_eq!(h.display.shown.len(), 3);
    }

    #[test]
    fn test_headless_stop_flag_runs_shutdown() {
        use crate::display::HeadlessDisplay;
        use std::sync::atomic::AtomicBool;

        let mut h = harness(ScriptedSource::with_frames(5), ScriptedDetector::default());
        let stop = Arc::new(AtomicBool::new(true));
        let mut display = HeadlessDisplay::new().with_stop_flag(stop);

        h.pump.run(&mut display);

        assert_eq!(h.pump.state(), LoopState::Terminating);
        assert_eq!(display.shown(), 1);
        assert_eq!(h.pump.connection.state(), ConnectionState::Disconnected);
        assert_eq!(h.pump.connection.source_mut().released, vec![1]);
    }

    #[test]
    fn test_stop_flag_honored_while_source_down() {
        use crate::display::HeadlessDisplay;
        use std::sync::atomic::AtomicBool;

        let mut source = ScriptedSource::default();
        source.opens.extend([false, false]);
        let mut h = harness(source, ScriptedDetector::default());
        let stop = Arc::new(AtomicBool::new(false));
        let mut display = HeadlessDisplay::new().with_stop_flag(Arc::clone(&stop));

        assert_eq!(h.pump.step(&mut display), LoopState::Running);
        stop.store(true, Ordering::SeqCst);
        assert_eq!(h.pump.step(&mut display), LoopState::Terminating);
        assert_eq!(display.shown(), 0);
    }
}
