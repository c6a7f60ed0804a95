// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLOv8 detector on ONNX Runtime
// load -> letterbox -> session.run -> decode + NMS

use anyhow::{anyhow, Context, Result};
use ndarray::ArrayView2;
use ort::execution_providers::CUDAExecutionProvider;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::path::PathBuf;
use tracing::{info, warn};

use super::names::{coco_names, parse_names};
use super::yolo::{decode_predictions, letterbox};
use super::ObjectDetector;
use crate::detection::{Detection, Frame};

/// Model loading options
#[derive(Debug, Clone)]
pub struct YOLOv8Config {
    pub model: PathBuf,
    pub inf_size: u32, // square input side
    pub conf: f32,     // pre-NMS floor; the watch filter applies its own threshold
    pub iou: f32,
    pub cuda: bool,
    pub device_id: i32,
}

impl YOLOv8Config {
    pub fn new(model: impl Into<PathBuf>) -> Self {
        Self {
            model: model.into(),
            inf_size: 640,
            conf: 0.1,
            iou: 0.45,
            cuda: false,
            device_id: 0,
        }
    }
}

pub struct YoloV8Detector {
    session: Session,
    input_name: String,
    names: Vec<String>,
    config: YOLOv8Config,
    label: String,
}

impl YoloV8Detector {
    pub fn new(config: YOLOv8Config) -> Result<Self> {
        if !config.model.exists() {
            return Err(anyhow!("model file {} not found", config.model.display()));
        }
        info!("📦 Loading YOLOv8 model: {}", config.model.display());

        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?;
        if config.cuda {
            builder = builder.with_execution_providers([CUDAExecutionProvider::default()
                .with_device_id(config.device_id)
                .build()])?;
        }
        let session = builder
            .commit_from_file(&config.model)
            .with_context(|| format!("failed to load {}", config.model.display()))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "images".to_string());

        // class names from ultralytics metadata, COCO otherwise
        let names = match session.metadata().and_then(|m| m.custom("names")) {
            Ok(Some(raw)) => parse_names(&raw).unwrap_or_else(|| {
                warn!("⚠️ unreadable `names` metadata, using COCO classes");
                coco_names()
            }),
            _ => coco_names(),
        };

        let label = config
            .model
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "yolov8".to_string());

        info!(
            "✅ {} ready: input {} ({}x{}), {} classes, EP: {}",
            label,
            input_name,
            config.inf_size,
            config.inf_size,
            names.len(),
            if config.cuda { "CUDA (may fall back to CPU)" } else { "CPU" }
        );

        Ok(Self {
            session,
            input_name,
            names,
            config,
            label,
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl ObjectDetector for YoloV8Detector {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let lb = letterbox(frame, self.config.inf_size)?;
        let shape = lb.tensor.shape().to_vec();
        let data: Vec<f32> = lb.tensor.iter().copied().collect();
        let input = Value::from_array((shape.as_slice(), data.into_boxed_slice()))?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input])?;
        let (out_shape, out) = outputs[0].try_extract_tensor::<f32>()?;

        // [1, 4 + nc, anchors]
        let dims: Vec<usize> = out_shape.iter().map(|&d| d as usize).collect();
        let (rows, cols) = match dims.as_slice() {
            [1, rows, cols] | [rows, cols] => (*rows, *cols),
            _ => return Err(anyhow!("unexpected output shape {:?}", dims)),
        };
        let preds = ArrayView2::from_shape((rows, cols), out)?;

        Ok(decode_predictions(
            preds,
            &self.names,
            lb.ratio,
            frame.dimensions(),
            self.config.conf,
            self.config.iou,
        ))
    }

    fn name(&self) -> &str {
        &self.label
    }
}
