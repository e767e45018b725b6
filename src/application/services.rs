use base64::{prelude::BASE64_STANDARD, Engine};
use image::RgbImage;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::{debug, error, info};

use crate::{
    application::{
        dto::DetectionResponse,
        ports::{AnnotatorPort, InferencePort, ModelCatalogPort, ModelLoaderPort},
    },
    domain::{
        detection::Detection,
        errors::{DomainError, DomainResult},
        model::{DetectorStatus, ModelId},
    },
};

enum DetectorState {
    Unloaded,
    Loading,
    Ready(Arc<dyn InferencePort>),
    Failed(String),
}

struct Slot {
    model: Option<ModelId>,
    state: DetectorState,
}

/// Point-in-time view of the detector, used by the readiness route.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSnapshot {
    pub status: DetectorStatus,
    pub model: Option<String>,
    pub detail: Option<String>,
}

/// Owns the single model handle and turns raw image bytes into detections.
///
/// Lifecycle: `Unloaded -> Loading -> Ready | Failed`. `Ready` is terminal and a
/// failed load is never retried on its own.
pub struct DetectorService {
    catalog: Arc<dyn ModelCatalogPort>,
    loader: Arc<dyn ModelLoaderPort>,
    annotator: Option<Arc<dyn AnnotatorPort>>,
    slot: RwLock<Slot>,
}

impl DetectorService {
    pub fn new(
        catalog: Arc<dyn ModelCatalogPort>,
        loader: Arc<dyn ModelLoaderPort>,
        annotator: Option<Arc<dyn AnnotatorPort>>,
    ) -> Self {
        Self {
            catalog,
            loader,
            annotator,
            slot: RwLock::new(Slot { model: None, state: DetectorState::Unloaded }),
        }
    }

    /// Resolves `model` and builds the inference handle on the blocking pool.
    pub async fn load(&self, model: ModelId) -> DomainResult<()> {
        {
            let mut slot = self.slot.write().map_err(|_| lock_failed())?;
            match slot.state {
                DetectorState::Loading => {
                    return Err(DomainError::ModelLoad("a model load is already in progress".into()))
                }
                DetectorState::Ready(_) => {
                    return Err(DomainError::ModelLoad("a model is already loaded".into()))
                }
                DetectorState::Unloaded | DetectorState::Failed(_) => {}
            }
            slot.state = DetectorState::Loading;
            slot.model = Some(model.clone());
        }

        info!("Loading model '{}'...", model.name);
        let started = Instant::now();
        let result = self.build_engine(&model).await;

        let mut slot = self.slot.write().map_err(|_| lock_failed())?;
        match result {
            Ok((resolved, engine)) => {
                info!(
                    "✅ Model '{}' loaded from {} ({} classes) in {} ms",
                    resolved.name,
                    resolved.onnx_path,
                    engine.labels().len(),
                    started.elapsed().as_millis()
                );
                slot.model = Some(resolved);
                slot.state = DetectorState::Ready(engine);
                Ok(())
            }
            Err(e) => {
                error!("❌ Failed to load model '{}': {}", model.name, e);
                slot.state = DetectorState::Failed(e.to_string());
                Err(match e {
                    DomainError::ModelLoad(_) => e,
                    other => DomainError::ModelLoad(other.to_string()),
                })
            }
        }
    }

    async fn build_engine(&self, model: &ModelId) -> DomainResult<(ModelId, Arc<dyn InferencePort>)> {
        let resolved = self.catalog.resolve_model(model).await?;

        let loader = self.loader.clone();
        let target = resolved.clone();
        let engine = tokio::task::spawn_blocking(move || loader.load(&target))
            .await
            .map_err(|e| DomainError::ModelLoad(format!("loader task failed: {}", e)))??;

        Ok((resolved, engine))
    }

    pub fn snapshot(&self) -> DetectorSnapshot {
        let Ok(slot) = self.slot.read() else {
            return DetectorSnapshot {
                status: DetectorStatus::Failed,
                model: None,
                detail: Some("detector state lock poisoned".into()),
            };
        };
        let (status, detail) = match &slot.state {
            DetectorState::Unloaded => (DetectorStatus::Unloaded, None),
            DetectorState::Loading => (DetectorStatus::Loading, None),
            DetectorState::Ready(_) => (DetectorStatus::Ready, None),
            DetectorState::Failed(reason) => (DetectorStatus::Failed, Some(reason.clone())),
        };
        DetectorSnapshot {
            status,
            model: slot.model.as_ref().map(|m| m.name.clone()),
            detail,
        }
    }

    fn engine(&self) -> DomainResult<Arc<dyn InferencePort>> {
        let slot = self.slot.read().map_err(|_| lock_failed())?;
        match &slot.state {
            DetectorState::Ready(engine) => Ok(engine.clone()),
            DetectorState::Unloaded => Err(DomainError::NotReady("model has not been loaded".into())),
            DetectorState::Loading => Err(DomainError::NotReady("model is still loading".into())),
            DetectorState::Failed(reason) => {
                Err(DomainError::NotReady(format!("model failed to load: {}", reason)))
            }
        }
    }

    /// Runs detection on the blocking pool. Errors are returned unclassified
    /// for the caller to map.
    pub async fn detect(&self, image_bytes: Vec<u8>) -> DomainResult<DetectionResponse> {
        let engine = self.engine()?;
        let annotator = self.annotator.clone();

        tokio::task::spawn_blocking(move || {
            run_detection(engine.as_ref(), annotator.as_deref(), &image_bytes)
        })
        .await
        .map_err(|e| DomainError::OperationFailed(format!("detection task failed: {}", e)))?
    }
}

fn lock_failed() -> DomainError {
    DomainError::OperationFailed("detector state lock poisoned".into())
}

/// Decode, infer, normalize and render one image.
pub fn run_detection(
    engine: &dyn InferencePort,
    annotator: Option<&dyn AnnotatorPort>,
    image_bytes: &[u8],
) -> DomainResult<DetectionResponse> {
    let rgb = decode_rgb(image_bytes)?;
    let (width, height) = rgb.dimensions();

    let t_infer_start = Instant::now();
    let raw = engine.infer(&rgb)?;
    debug!(
        "Inference on {}x{} took {:.1} ms ({} candidates)",
        width,
        height,
        t_infer_start.elapsed().as_secs_f32() * 1000.0,
        raw.len()
    );

    let labels = engine.labels();
    let detections: Vec<Detection> = raw
        .iter()
        .map(|r| Detection::from_raw(r, labels, width, height))
        .collect();

    let annotated_image = match annotator {
        Some(annotator) => Some(BASE64_STANDARD.encode(annotator.annotate(&rgb, &detections)?)),
        None => None,
    };

    Ok(DetectionResponse { detections, annotated_image })
}

/// Decodes any supported still raster format into 8-bit RGB.
pub fn decode_rgb(bytes: &[u8]) -> DomainResult<RgbImage> {
    if bytes.is_empty() {
        return Err(DomainError::InvalidImage("image data is empty".into()));
    }
    let img = image::load_from_memory(bytes)
        .map_err(|e| DomainError::InvalidImage(format!("failed to decode image: {}", e)))?;
    Ok(img.to_rgb8())
}
