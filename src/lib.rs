// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! Bear sentinel: camera watch with reconnecting capture, class filtering and
//! a cooldown-gated alert sound.
pub mod alert; // alert sound dispatch (cooldown + single flight)
pub mod config; // CLI args + JSON config
pub mod detection; // detection types + filter
pub mod display; // window / headless display
pub mod error; // typed errors of the watch loop
pub mod input; // video source + connection manager
pub mod models; // detector interface + implementations
pub mod pump; // main frame pump
pub mod renderer; // box / label overlay
pub mod server; // single-shot HTTP detection
pub mod timing; // clock + backoff sleeper

pub use crate::alert::{AlertDispatcher, CommandPlayer, SoundPlayer};
pub use crate::config::{Args, SentinelConfig, TargetClasses};
pub use crate::detection::{BBox, Detection, DetectionFilter, FilterOutcome, Frame};
pub use crate::display::{Display, HeadlessDisplay};
pub use crate::error::{ConnectError, PlaybackError, ReadError, StartupError};
pub use crate::input::{ConnectionManager, ConnectionState, SourceHandle, SourceId, VideoSource};
pub use crate::models::ObjectDetector;
pub use crate::pump::{FramePump, LoopState, PumpStats};
pub use crate::renderer::OverlayRenderer;
pub use crate::timing::{Clock, Sleeper, SystemClock, ThreadSleeper};

/// Install the global `tracing` subscriber (`RUST_LOG` wins over `default_filter`)
pub fn init_logging(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Local wall-clock time string, used in alert log lines
pub fn gen_time_string(delimiter: &str) -> String {
    let t_now = chrono::Local::now();
    let fmt = format!(
        "%Y{}%m{}%d{}%H{}%M{}%S",
        delimiter, delimiter, delimiter, delimiter, delimiter
    );
    t_now.format(&fmt).to_string()
}
