use serde::{Deserialize, Serialize};

use crate::domain::detection::Detection;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectionResponse {
    pub detections: Vec<Detection>,
    /// Base64 JPEG with boxes and labels drawn, `null` when nothing was rendered.
    pub annotated_image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub message: String,
    pub status: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            message: "VisionGuard API is running".to_string(),
            status: "healthy".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub model: String,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}
