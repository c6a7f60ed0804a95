// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// FFmpeg decode filter: decoded YUV420P frame -> RGB `Frame` on a channel
use crate::detection::Frame;
use crossbeam_channel::Sender;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame as AvFrame};
use std::time::Instant;
use tracing::{debug, info};

/// Converts every decoded frame to RGB and hands it to the watch loop.
///
/// The channel is bounded; when the loop is busy (inference) new frames are
/// dropped instead of queueing up stale video.
#[derive(Clone)]
pub struct DecodeFilter {
    pub tx: Sender<Frame>,
    pub count: usize,
    pub dropped: usize,
    pub last: Instant,
    pub current_fps: f64,
}

impl DecodeFilter {
    pub fn new(tx: Sender<Frame>) -> Self {
        Self {
            tx,
            count: 0,
            dropped: 0,
            last: Instant::now(),
            current_fps: 0.0,
        }
    }
}

impl FrameFilter for DecodeFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        info!("✅ decode thread started");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: AvFrame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<AvFrame>, String> {
        unsafe {
            if frame.as_ptr().is_null() {
                return Ok(Some(frame));
            }

            let w = (*frame.as_ptr()).width as u32;
            let h = (*frame.as_ptr()).height as u32;
            if w == 0 || h == 0 {
                return Ok(Some(frame));
            }

            self.count += 1;

            // YUV420P -> RGB (BT.601), pipeline forces format=yuv420p
            let data_y = (*frame.as_ptr()).data[0];
            let data_u = (*frame.as_ptr()).data[1];
            let data_v = (*frame.as_ptr()).data[2];
            let y_stride = (*frame.as_ptr()).linesize[0] as usize;
            let uv_stride = (*frame.as_ptr()).linesize[1] as usize;

            let mut rgb = vec![0u8; (w * h * 3) as usize];
            for y in 0..h as usize {
                for x in 0..w as usize {
                    let y_val = *data_y.add(y * y_stride + x) as f32;
                    let u_val = *data_u.add((y / 2) * uv_stride + x / 2) as f32 - 128.0;
                    let v_val = *data_v.add((y / 2) * uv_stride + x / 2) as f32 - 128.0;

                    let idx = (y * w as usize + x) * 3;
                    rgb[idx] = (y_val + 1.402 * v_val).clamp(0.0, 255.0) as u8;
                    rgb[idx + 1] = (y_val - 0.344 * u_val - 0.714 * v_val).clamp(0.0, 255.0) as u8;
                    rgb[idx + 2] = (y_val + 1.772 * u_val).clamp(0.0, 255.0) as u8;
                }
            }

            // decode statistics once per second
            if self.last.elapsed().as_secs_f64() >= 1.0 {
                let elapsed = self.last.elapsed().as_secs_f64();
                self.current_fps = self.count as f64 / elapsed;
                debug!(
                    "📺 decode: {} frames | {:.1}fps | dropped {}",
                    self.count, self.current_fps, self.dropped
                );
                self.last = Instant::now();
                self.count = 0;
                self.dropped = 0;
            }

            if let Some(image) = Frame::from_raw(w, h, rgb) {
                // try_send: never block the decoder on a busy consumer
                if self.tx.try_send(image).is_err() {
                    self.dropped += 1;
                }
            }

            Ok(Some(frame))
        }
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        info!("✅ decode thread stopped");
    }
}
