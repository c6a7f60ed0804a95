// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// Detector interface and implementations
///
/// ## ObjectDetector
/// The watch loop and the HTTP endpoint only see this trait:
/// ```text
/// Frame ──▶ infer ──▶ Vec<Detection> (class name, confidence, xyxy box)
/// ```
/// A failing `infer` is treated as a transient error by the watch loop.
///
/// ## Implementations
/// - **yolo**:   YOLOv8 tensor layout (letterbox input, anchor decode, NMS)
/// - **yolov8**: ONNX Runtime session on top of `yolo` (feature `onnx`)
use anyhow::Result;

use crate::detection::{Detection, Frame};

/// Object detection model
pub trait ObjectDetector: Send {
    /// Detect objects in one frame, boxes in frame pixel coordinates
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>>;

    /// Model name for logs
    fn name(&self) -> &str;
}

impl<D: ObjectDetector + ?Sized> ObjectDetector for Box<D> {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        (**self).infer(frame)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

pub mod names; // class names (COCO + model metadata)
pub mod yolo; // YOLOv8 pre/post-processing
#[cfg(feature = "onnx")]
pub mod yolov8; // ONNX Runtime detector

pub use names::{parse_names, COCO_CLASSES};
pub use yolo::{decode_predictions, letterbox, non_max_suppression, Letterbox};
#[cfg(feature = "onnx")]
pub use yolov8::{YOLOv8Config, YoloV8Detector};

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use anyhow::anyhow;
    use std::collections::VecDeque;

    /// Detector replaying scripted results; exhausted script -> no detections
    #[derive(Default)]
    pub struct ScriptedDetector {
        pub results: VecDeque<Result<Vec<Detection>>>,
        pub calls: usize,
    }

    impl ScriptedDetector {
        pub fn push(&mut self, dets: Vec<Detection>) {
            self.results.push_back(Ok(dets));
        }

        pub fn push_err(&mut self, msg: &str) {
            self.results.push_back(Err(anyhow!(msg.to_string())));
        }
    }

    impl ObjectDetector for ScriptedDetector {
        fn infer(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
            self.calls += 1;
            self.results.pop_front().unwrap_or_else(|| Ok(vec![]))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }
}
