use async_trait::async_trait;
use image::RgbImage;
use std::sync::Arc;

use crate::domain::{
    detection::{Detection, RawDetection},
    errors::DomainResult,
    model::ModelId,
};

#[async_trait]
pub trait ModelCatalogPort: Send + Sync {
    /// Resolves an identifier (path or name) to a model with a weights file.
    async fn resolve_model(&self, model: &ModelId) -> DomainResult<ModelId>;
}

/// Builds a ready inference handle. Blocking: may read large weight files.
pub trait ModelLoaderPort: Send + Sync {
    fn load(&self, model: &ModelId) -> DomainResult<Arc<dyn InferencePort>>;
}

pub trait InferencePort: Send + Sync {
    /// Label vocabulary indexed by class id.
    fn labels(&self) -> &[String];

    /// Runs the forward pass and returns candidates in original-image pixels,
    /// already thresholded and suppressed, in descending score order.
    fn infer(&self, image: &RgbImage) -> DomainResult<Vec<RawDetection>>;
}

pub trait AnnotatorPort: Send + Sync {
    /// Draws the detections onto a copy of `image` and returns it JPEG encoded.
    fn annotate(&self, image: &RgbImage, detections: &[Detection]) -> DomainResult<Vec<u8>>;
}
