use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelId {
    pub name: String,       // identifier as configured, e.g. "yolov8n.pt"
    pub onnx_path: String,  // resolved weights file, empty until the catalog resolves it
}

impl ModelId {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), onnx_path: String::new() }
    }
}

/// Inference thresholds. The defaults mirror the Ultralytics predictor and are
/// not exposed to HTTP callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct YoloParams {
    pub input_size: u32,        // 640 typical
    pub conf_threshold: f32,    // 0..1
    pub iou_threshold: f32,     // 0..1
    pub max_detections: usize,
}

impl Default for YoloParams {
    fn default() -> Self {
        Self {
            input_size: 640,
            conf_threshold: 0.25,
            iou_threshold: 0.7,
            max_detections: 300,
        }
    }
}

/// Lifecycle of the single model handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorStatus {
    Unloaded,
    Loading,
    Ready,
    Failed,
}

impl DetectorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }
}
