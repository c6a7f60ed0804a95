// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// Video input system
///
/// - VideoSource:       capability trait (open / read / release)
/// - ConnectionManager: reconnect state machine around one source
/// - FfmpegSource:      camera / file / RTSP decoding (feature `ffmpeg`)
pub mod connection;

#[cfg(feature = "ffmpeg")]
pub mod camera;
#[cfg(feature = "ffmpeg")]
pub mod decode_filter;
#[cfg(feature = "ffmpeg")]
pub mod decoder;

pub use connection::{ConnectionManager, ConnectionState, SourceHandle};

#[cfg(feature = "ffmpeg")]
pub use camera::get_camera_devices;
#[cfg(feature = "ffmpeg")]
pub use decoder::FfmpegSource;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use tracing::info;

use crate::detection::Frame;

/// Where frames come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceId {
    Device(u32),     // local camera index
    File(PathBuf),   // video file
    Url(String),     // network stream (rtsp://, http://, ...)
}

impl FromStr for SourceId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty video source".to_string());
        }
        if let Ok(index) = s.parse::<u32>() {
            return Ok(SourceId::Device(index));
        }
        if s.contains("://") {
            return Ok(SourceId::Url(s.to_string()));
        }
        Ok(SourceId::File(PathBuf::from(s)))
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceId::Device(index) => write!(f, "camera #{}", index),
            SourceId::File(path) => write!(f, "{}", path.display()),
            SourceId::Url(url) => write!(f, "{}", url),
        }
    }
}

/// Video capture capability
///
/// Every method may block; failures carry a human readable cause only.
pub trait VideoSource {
    type Handle;

    fn open(&mut self, id: &SourceId) -> Result<Self::Handle>;

    fn read(&mut self, handle: &mut Self::Handle) -> Result<Frame>;

    fn release(&mut self, handle: Self::Handle);
}

/// Try camera indices `0..max_index`, returning the ones that open
pub fn probe_devices<S: VideoSource>(source: &mut S, max_index: u32) -> Vec<u32> {
    let mut available = Vec::new();
    for index in 0..max_index {
        match source.open(&SourceId::Device(index)) {
            Ok(handle) => {
                info!("✅ camera #{}: available", index);
                source.release(handle);
                available.push(index);
            }
            Err(e) => info!("❌ camera #{}: unavailable ({})", index, e),
        }
    }
    available
}
