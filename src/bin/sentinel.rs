// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// Bear sentinel
///
/// Camera watch with an audible bear alert:
/// 1. source:  FFmpeg capture (camera / file / RTSP), reconnects forever
/// 2. detect:  YOLOv8 on ONNX Runtime, target classes only
/// 3. alert:   sound on bear, 5 s cooldown, one playback at a time
/// 4. display: macroquad window ('q' / Esc to quit) or `--headless`
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};

use bear_sentinel::display::MacroquadDisplay;
use bear_sentinel::input::{get_camera_devices, probe_devices, FfmpegSource};
use bear_sentinel::models::{YOLOv8Config, YoloV8Detector};
use bear_sentinel::{
    init_logging, AlertDispatcher, Args, CommandPlayer, ConnectionManager, DetectionFilter,
    FramePump, HeadlessDisplay, LoopState, OverlayRenderer, SentinelConfig, StartupError,
    SystemClock, ThreadSleeper,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const WINDOW_WIDTH: i32 = 1280;
const WINDOW_HEIGHT: i32 = 720;

fn main() {
    init_logging("bear_sentinel=info,sentinel=info,ort=warn");
    let args = Args::parse();

    if let Err(e) = run(args) {
        error!("❌ {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = SentinelConfig::from_args(&args)?;

    if let Some(path) = &args.write_config {
        config.save(path)?;
        return Ok(());
    }
    if args.list_cameras {
        list_cameras(&config, args.max_devices);
        return Ok(());
    }

    info!("🚀 Bear sentinel starting");
    config.print_summary();

    // ========== model ==========
    let mut model_config = YOLOv8Config::new(&config.model);
    model_config.inf_size = config.inf_size;
    model_config.conf = config.confidence_threshold;
    model_config.cuda = args.cuda;
    model_config.device_id = args.device_id;
    let detector = YoloV8Detector::new(model_config)
        .map_err(|e| StartupError::model_load(format!("{:#}", e)))?;

    // ========== source ==========
    let connection = ConnectionManager::new(
        FfmpegSource::new(config.read_timeout()),
        config.source_id()?,
        config.backoff(),
        Box::new(ThreadSleeper),
    );

    // ========== alert ==========
    if !config.alert_sound.is_file() {
        warn!(
            "⚠️ alert sound {} not found, alerts will only be logged",
            config.alert_sound.display()
        );
    }
    let dispatcher = AlertDispatcher::new(
        Arc::new(CommandPlayer::new(config.player.clone())),
        config.alert_sound.clone(),
        config.cooldown(),
    );

    let mut pump = FramePump::new(
        connection,
        Box::new(detector),
        DetectionFilter::new(
            config.confidence_threshold,
            config.target_classes.clone(),
            config.alert_class.clone(),
        ),
        OverlayRenderer::new(&config.font),
        dispatcher,
        Box::new(SystemClock),
        config.window_name.clone(),
    );

    // Ctrl-C ends the loop like 'q', so shutdown still runs
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        info!("🛑 Ctrl-C received, stopping...");
        flag.store(true, Ordering::SeqCst);
    })
    .map_err(|e| StartupError::config(format!("failed to install Ctrl-C handler: {}", e)))?;

    if args.headless {
        pump.run(&mut HeadlessDisplay::new().with_stop_flag(stop));
        return Ok(());
    }

    // ========== window loop ==========
    let conf = macroquad::conf::Conf {
        window_title: config.window_name.clone(),
        window_width: WINDOW_WIDTH,
        window_height: WINDOW_HEIGHT,
        window_resizable: true,
        ..Default::default()
    };
    macroquad::Window::from_config(conf, async move {
        let mut display = MacroquadDisplay::new().with_stop_flag(stop);
        info!("🚀 watch loop started ('q' or Esc to quit)");
        while pump.step(&mut display) == LoopState::Running {
            macroquad::window::next_frame().await;
        }
        pump.shutdown(&mut display);
    });
    Ok(())
}

fn list_cameras(config: &SentinelConfig, max_devices: u32) {
    let devices = get_camera_devices();
    if devices.is_empty() {
        info!("📷 FFmpeg reports no named camera devices");
    }
    for (index, name) in &devices {
        info!("📷 [{}] {}", index, name);
    }

    let mut source = FfmpegSource::new(config.read_timeout());
    let available = probe_devices(&mut source, max_devices);
    if available.is_empty() {
        warn!("⚠️ no camera could be opened (checked 0..{})", max_devices);
    } else {
        info!("✅ usable camera indices: {:?}", available);
    }
}
