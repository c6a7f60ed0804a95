// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// Detection server: `POST /detect` with a multipart image, JSON predictions back
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use bear_sentinel::models::{YOLOv8Config, YoloV8Detector};
use bear_sentinel::server::{serve, AppState, ServerSettings};
use bear_sentinel::{init_logging, StartupError};

#[derive(Parser, Debug)]
#[command(author, version, about = "Bear sentinel detection server", long_about = None)]
struct ServerArgs {
    /// Listen address
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    #[arg(short, long, default_value_t = 8001)]
    port: u16,

    /// ONNX detection model
    #[arg(short, long, default_value = "models/yolov8n.onnx")]
    model: PathBuf,

    /// Minimum score of returned predictions
    #[arg(short, long, default_value_t = 0.1)]
    conf: f32,

    /// Returned classes
    #[arg(long, value_delimiter = ',', default_value = "person,car,bear")]
    classes: Vec<String>,

    /// Origins allowed by CORS
    #[arg(long, value_delimiter = ',', default_value = "http://localhost:8000,http://127.0.0.1:8000")]
    cors_origins: Vec<String>,

    #[arg(long)]
    cuda: bool,
}

#[tokio::main]
async fn main() {
    init_logging("bear_sentinel=info,detect_server=info,ort=warn");
    let args = ServerArgs::parse();

    if let Err(e) = run(args).await {
        error!("❌ {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: ServerArgs) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .map_err(|e| StartupError::config(format!("bad listen address: {}", e)))?;

    let mut model_config = YOLOv8Config::new(&args.model);
    model_config.conf = args.conf;
    model_config.cuda = args.cuda;
    let detector = YoloV8Detector::new(model_config)
        .map_err(|e| StartupError::model_load(format!("{:#}", e)))?;

    let settings = ServerSettings {
        allowed_classes: args.classes,
        threshold: args.conf,
        cors_origins: args.cors_origins,
    };
    info!(
        "🎯 classes: {} | threshold: {:.2}",
        settings.allowed_classes.join(", "),
        settings.threshold
    );

    serve(AppState::new(Box::new(detector), settings), addr).await
}
