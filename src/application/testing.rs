//! In-memory doubles for the ports, shared by the service and router tests.

use async_trait::async_trait;
use image::{codecs::jpeg::JpegEncoder, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};

use crate::application::ports::{AnnotatorPort, InferencePort, ModelCatalogPort, ModelLoaderPort};
use crate::domain::{
    detection::{Detection, RawDetection},
    errors::{DomainError, DomainResult},
    model::ModelId,
};

pub struct FakeEngine {
    labels: Vec<String>,
    detections: Vec<RawDetection>,
    fail_with: Option<String>,
    calls: AtomicUsize,
}

impl FakeEngine {
    pub fn new(detections: Vec<RawDetection>) -> Self {
        Self {
            labels: vec!["person".into(), "bicycle".into(), "car".into()],
            detections,
            fail_with: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self { fail_with: Some(message.to_string()), ..Self::new(vec![]) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl InferencePort for FakeEngine {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn infer(&self, _image: &RgbImage) -> DomainResult<Vec<RawDetection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.fail_with {
            Some(msg) => Err(DomainError::Inference(msg.clone())),
            None => Ok(self.detections.clone()),
        }
    }
}

pub struct FakeLoader {
    engine: Arc<FakeEngine>,
    gate: Option<Mutex<mpsc::Receiver<()>>>,
}

impl FakeLoader {
    pub fn new(engine: Arc<FakeEngine>) -> Self {
        Self { engine, gate: None }
    }

    /// Blocks inside `load` until a message arrives on `gate`.
    pub fn gated(engine: Arc<FakeEngine>, gate: mpsc::Receiver<()>) -> Self {
        Self { engine, gate: Some(Mutex::new(gate)) }
    }
}

impl ModelLoaderPort for FakeLoader {
    fn load(&self, _model: &ModelId) -> DomainResult<Arc<dyn InferencePort>> {
        if let Some(gate) = &self.gate {
            let rx = gate.lock().unwrap();
            let _ = rx.recv();
        }
        let engine: Arc<dyn InferencePort> = self.engine.clone();
        Ok(engine)
    }
}

pub struct StaticCatalog {
    exists: bool,
}

impl StaticCatalog {
    pub fn found() -> Self {
        Self { exists: true }
    }

    pub fn missing() -> Self {
        Self { exists: false }
    }
}

#[async_trait]
impl ModelCatalogPort for StaticCatalog {
    async fn resolve_model(&self, model: &ModelId) -> DomainResult<ModelId> {
        if !self.exists {
            return Err(DomainError::NotFound(format!("model '{}' not found", model.name)));
        }
        Ok(ModelId { name: model.name.clone(), onnx_path: format!("{}.onnx", model.name) })
    }
}

/// Re-encodes the input untouched.
pub struct JpegAnnotator;

impl AnnotatorPort for JpegAnnotator {
    fn annotate(&self, image: &RgbImage, _detections: &[Detection]) -> DomainResult<Vec<u8>> {
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, 90)
            .encode_image(image)
            .map_err(|e| DomainError::OperationFailed(e.to_string()))?;
        Ok(buf)
    }
}

pub fn canvas(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([240, 240, 240]))
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    canvas(width, height).write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut img = canvas(width, height);
    for (x, y, px) in img.enumerate_pixels_mut() {
        *px = Rgb([(x % 256) as u8, (y % 256) as u8, 128]);
    }
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Jpeg).unwrap();
    buf.into_inner()
}
