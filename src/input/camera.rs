// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! Local camera addressing for FFmpeg
//!
//! DirectShow (Windows) / AVFoundation (macOS) / V4L2 (Linux)

use anyhow::{anyhow, Result};
use tracing::warn;

/// FFmpeg input format for local cameras on this platform
pub fn camera_format() -> &'static str {
    #[cfg(target_os = "windows")]
    {
        "dshow" // DirectShow
    }
    #[cfg(target_os = "macos")]
    {
        "avfoundation" // AVFoundation
    }
    #[cfg(target_os = "linux")]
    {
        "v4l2" // Video4Linux2
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        "video4linux2"
    }
}

/// FFmpeg input URL for camera `index`
///
/// dshow addresses devices by name, so the index is resolved through the
/// device list there.
pub fn camera_url(index: u32) -> Result<String> {
    #[cfg(target_os = "windows")]
    {
        let devices = get_camera_devices();
        let (_, name) = devices
            .into_iter()
            .find(|(i, _)| *i == index as usize)
            .ok_or_else(|| anyhow!("no camera with index {}", index))?;
        Ok(format!("video={}", name))
    }
    #[cfg(target_os = "macos")]
    {
        Ok(format!("{}", index))
    }
    #[cfg(target_os = "linux")]
    {
        let path = format!("/dev/video{}", index);
        if !std::path::Path::new(&path).exists() {
            return Err(anyhow!("{} does not exist", path));
        }
        Ok(path)
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        Ok(format!("{}", index))
    }
}

/// Available camera devices as (index, name)
pub fn get_camera_devices() -> Vec<(usize, String)> {
    match ez_ffmpeg::device::get_input_video_devices() {
        Ok(devices) => devices.into_iter().enumerate().collect(),
        Err(e) => {
            warn!("⚠️ failed to list cameras: {}", e);
            vec![]
        }
    }
}
