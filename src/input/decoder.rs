// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// FFmpeg video source: local camera, video file or network stream
use super::camera::{camera_format, camera_url};
use super::decode_filter::DecodeFilter;
use super::{SourceId, VideoSource};
use crate::detection::Frame;
use anyhow::{anyhow, bail, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::core::scheduler::ffmpeg_scheduler::{FfmpegScheduler, Running};
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Input};
use std::time::Duration;
use tracing::{debug, info};

/// Decoded frames buffered between FFmpeg and the watch loop
const FRAME_QUEUE: usize = 2;

/// Opens sources through FFmpeg; decoding runs on FFmpeg's own threads
pub struct FfmpegSource {
    read_timeout: Duration,
}

/// One running FFmpeg pipeline
pub struct FfmpegHandle {
    scheduler: Option<FfmpegScheduler<Running>>,
    frames: Receiver<Frame>,
}

impl FfmpegSource {
    pub fn new(read_timeout: Duration) -> Self {
        Self { read_timeout }
    }

    fn build_input(id: &SourceId) -> Result<Input> {
        let input = match id {
            SourceId::Device(index) => {
                let url = camera_url(*index)?;
                debug!("🔍 camera format: {}, input: {}", camera_format(), url);
                Input::new(url).set_format(camera_format())
            }
            SourceId::File(path) => {
                if !path.exists() {
                    bail!("{} does not exist", path.display());
                }
                Input::new(path.to_string_lossy().to_string())
            }
            SourceId::Url(url) if url.starts_with("rtsp") => {
                // RTSP over TCP, large receive buffer
                Input::new(url.clone()).set_input_opts(
                    [
                        ("rtsp_transport", "tcp"),
                        ("buffer_size", "67108864"),
                        ("rtsp_flags", "prefer_tcp"),
                    ]
                    .into(),
                )
            }
            SourceId::Url(url) => Input::new(url.clone()),
        };
        Ok(input)
    }
}

impl VideoSource for FfmpegSource {
    type Handle = FfmpegHandle;

    fn open(&mut self, id: &SourceId) -> Result<FfmpegHandle> {
        let (tx, rx) = crossbeam_channel::bounded(FRAME_QUEUE);

        // frame pipeline: decode -> RGB -> channel
        let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
        let pipe = pipe.filter("decode", Box::new(DecodeFilter::new(tx)));
        let out = create_null_output().add_frame_pipeline(pipe);

        let ctx = FfmpegContext::builder()
            .input(Self::build_input(id)?)
            .filter_desc("format=yuv420p")
            .output(out)
            .build()
            .map_err(|e| anyhow!("build failed: {}", e))?;

        let scheduler = ctx.start().map_err(|e| anyhow!("start failed: {}", e))?;
        info!("🎬 FFmpeg pipeline started for {}", id);

        Ok(FfmpegHandle {
            scheduler: Some(scheduler),
            frames: rx,
        })
    }

    fn read(&mut self, handle: &mut FfmpegHandle) -> Result<Frame> {
        match handle.frames.recv_timeout(self.read_timeout) {
            Ok(frame) => Ok(frame),
            Err(RecvTimeoutError::Timeout) => bail!(
                "no frame within {}ms",
                self.read_timeout.as_millis()
            ),
            Err(RecvTimeoutError::Disconnected) => bail!("stream ended"),
        }
    }

    fn release(&mut self, mut handle: FfmpegHandle) {
        if let Some(scheduler) = handle.scheduler.take() {
            scheduler.abort();
            debug!("🛑 FFmpeg pipeline aborted");
        }
    }
}
