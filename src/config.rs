// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! Startup configuration: clap arguments + optional JSON file

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use image::Rgb;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::StartupError;
use crate::input::SourceId;

/// Bear sentinel arguments
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Bear sentinel - camera watch with audible bear alert", long_about = None)]
pub struct Args {
    /// Video source: device index (0), file path, or stream URL (rtsp://...)
    #[arg(short, long, default_value = "0")]
    pub source: String,

    /// ONNX detection model
    #[arg(short, long, default_value = "models/yolov8n.onnx")]
    pub model: String,

    /// Model input size (square)
    #[arg(long, default_value_t = 640)]
    pub inf_size: u32,

    /// Run the model on CUDA
    #[arg(long)]
    pub cuda: bool,

    /// CUDA device id
    #[arg(long, default_value_t = 0)]
    pub device_id: i32,

    /// Confidence threshold for kept detections
    #[arg(short, long, default_value_t = 0.5)]
    pub conf: f32,

    /// Class that triggers the alert sound
    #[arg(long, default_value = "bear")]
    pub alert_class: String,

    /// Only watch for the alert class (ignore the other target classes)
    #[arg(long)]
    pub alert_only: bool,

    /// Minimum seconds between two alert sounds
    #[arg(long, default_value_t = 5.0)]
    pub cooldown: f64,

    /// Seconds to wait before reconnecting a failed source
    #[arg(long, default_value_t = 5.0)]
    pub backoff: f64,

    /// Frame read timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    pub read_timeout_ms: u64,

    /// Alert sound file
    #[arg(long, default_value = "alert.mp3")]
    pub alert_sound: PathBuf,

    /// Program used to play the alert sound (blocking, file path as last argument)
    #[arg(long, default_value = "ffplay")]
    pub player: String,

    /// TrueType font for labels
    #[arg(long, default_value = "assets/font/DejaVuSans.ttf")]
    pub font: PathBuf,

    /// Window title
    #[arg(long, default_value = "Bear Detection System")]
    pub window: String,

    /// No window; log detections only
    #[arg(long)]
    pub headless: bool,

    /// JSON config file (its values replace the command line values)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write the effective config as JSON and exit
    #[arg(long)]
    pub write_config: Option<PathBuf>,

    /// Probe camera indices 0..max-devices and exit
    #[arg(long)]
    pub list_cameras: bool,

    /// Highest camera index probed by --list-cameras (exclusive)
    #[arg(long, default_value_t = 10)]
    pub max_devices: u32,
}

/// A highlighted class and its box color
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetClass {
    pub name: String,
    pub color: [u8; 3], // RGB
}

/// Target class name -> display color (ordered, immutable after startup)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetClasses(Vec<TargetClass>);

impl Default for TargetClasses {
    fn default() -> Self {
        Self(vec![
            TargetClass {
                name: "bear".into(),
                color: [255, 0, 0], // red
            },
            TargetClass {
                name: "person".into(),
                color: [0, 0, 255], // blue
            },
            TargetClass {
                name: "car".into(),
                color: [0, 255, 0], // green
            },
        ])
    }
}

impl TargetClasses {
    pub fn new(classes: Vec<TargetClass>) -> Self {
        Self(classes)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|c| c.name == name)
    }

    pub fn color(&self, name: &str) -> Option<Rgb<u8>> {
        self.0.iter().find(|c| c.name == name).map(|c| Rgb(c.color))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|c| c.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keep only `class` (single-class watch)
    pub fn only(&self, class: &str) -> Self {
        Self(self.0.iter().filter(|c| c.name == class).cloned().collect())
    }
}

/// Effective sentinel configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    // === source ===
    pub source: String,
    pub backoff_secs: f64,     // reconnect delay
    pub read_timeout_ms: u64,  // frame read timeout

    // === detection ===
    pub model: String,
    pub inf_size: u32,
    pub confidence_threshold: f32,
    pub target_classes: TargetClasses,
    pub alert_class: String,

    // === alert ===
    pub cooldown_secs: f64,
    pub alert_sound: PathBuf,
    pub player: String,

    // === display ===
    pub window_name: String,
    pub font: PathBuf,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            source: "0".into(),
            backoff_secs: 5.0,
            read_timeout_ms: 5000,
            model: "models/yolov8n.onnx".into(),
            inf_size: 640,
            confidence_threshold: 0.5,
            target_classes: TargetClasses::default(),
            alert_class: "bear".into(),
            cooldown_secs: 5.0,
            alert_sound: PathBuf::from("alert.mp3"),
            player: "ffplay".into(),
            window_name: "Bear Detection System".into(),
            font: PathBuf::from("assets/font/DejaVuSans.ttf"),
        }
    }
}

impl SentinelConfig {
    /// Command line values, replaced by `--config` when given.
    /// `--alert-only` narrows the targets in both cases.
    pub fn from_args(args: &Args) -> Result<Self, StartupError> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self {
                source: args.source.clone(),
                backoff_secs: args.backoff,
                read_timeout_ms: args.read_timeout_ms,
                model: args.model.clone(),
                inf_size: args.inf_size,
                confidence_threshold: args.conf,
                alert_class: args.alert_class.clone(),
                cooldown_secs: args.cooldown,
                alert_sound: args.alert_sound.clone(),
                player: args.player.clone(),
                window_name: args.window.clone(),
                font: args.font.clone(),
                ..Self::default()
            },
        };
        if args.alert_only {
            config.target_classes = config.target_classes.only(&config.alert_class);
        }
        config.validate()?;
        Ok(config)
    }

    /// Load from JSON; a missing file is created with the defaults
    pub fn load(path: &Path) -> Result<Self, StartupError> {
        match fs::read_to_string(path) {
            Ok(json) => {
                let config: Self = serde_json::from_str(&json).map_err(|e| {
                    StartupError::config(format!("{}: {}", path.display(), e))
                })?;
                info!("✅ config loaded from {}", path.display());
                Ok(config)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("📝 {} not found, writing default config", path.display());
                let config = Self::default();
                config.save(path)?;
                Ok(config)
            }
            Err(e) => Err(StartupError::config(format!("{}: {}", path.display(), e))),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), StartupError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| StartupError::config(format!("serialize config: {}", e)))?;
        fs::write(path, json)
            .map_err(|e| StartupError::config(format!("{}: {}", path.display(), e)))?;
        info!("💾 config saved to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<(), StartupError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(StartupError::config(format!(
                "confidence threshold {} outside [0, 1]",
                self.confidence_threshold
            )));
        }
        if !self.target_classes.contains(&self.alert_class) {
            return Err(StartupError::config(format!(
                "alert class `{}` is not one of the target classes",
                self.alert_class
            )));
        }
        if self.inf_size == 0 {
            return Err(StartupError::config("model input size must be positive"));
        }
        for (name, secs) in [("cooldown", self.cooldown_secs), ("backoff", self.backoff_secs)] {
            Duration::try_from_secs_f64(secs)
                .map_err(|e| StartupError::config(format!("{} {}s: {}", name, secs, e)))?;
        }
        self.source_id()?;
        Ok(())
    }

    pub fn source_id(&self) -> Result<SourceId, StartupError> {
        self.source.parse().map_err(StartupError::config)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::try_from_secs_f64(self.cooldown_secs).unwrap_or(Duration::ZERO)
    }

    pub fn backoff(&self) -> Duration {
        Duration::try_from_secs_f64(self.backoff_secs).unwrap_or(Duration::ZERO)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn print_summary(&self) {
        info!("🎛️  sentinel config:");
        info!("  source:      {}", self.source);
        info!("  model:       {} ({}px)", self.model, self.inf_size);
        info!("  confidence:  {:.2}", self.confidence_threshold);
        info!(
            "  targets:     {}",
            self.target_classes.names().collect::<Vec<_>>().join(", ")
        );
        info!("  alert class: {}", self.alert_class);
        info!(
            "  cooldown:    {:.1}s | backoff: {:.1}s",
            self.cooldown_secs, self.backoff_secs
        );
        info!("  sound:       {} via {}", self.alert_sound.display(), self.player);
    }
}
