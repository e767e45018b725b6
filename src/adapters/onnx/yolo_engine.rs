use anyhow::{anyhow, bail, Result};
use image::RgbImage;
use ndarray::{ArrayViewD, Axis, Ix2, IxDyn};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::adapters::onnx::{
    labels::{coco_labels, load_labels_file, parse_imgsz_metadata, parse_names_metadata},
    postprocess::{decode_predictions, is_channels_first},
    preprocess::{letterbox_tensor, Letterbox},
};
use crate::application::ports::{InferencePort, ModelLoaderPort};
use crate::domain::{
    detection::RawDetection,
    errors::{DomainError, DomainResult},
    model::{ModelId, YoloParams},
};

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub intra_threads: usize,
    /// Overrides the label table embedded in the model.
    pub labels_file: Option<PathBuf>,
    pub params: YoloParams,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self { intra_threads: 4, labels_file: None, params: YoloParams::default() }
    }
}

/// Ultralytics YOLO detection export running on ONNX Runtime.
pub struct OnnxYoloEngine {
    // `Session::run` needs exclusive access.
    session: Mutex<Session>,
    labels: Vec<String>,
    input_w: u32,
    input_h: u32,
    params: YoloParams,
}

impl OnnxYoloEngine {
    pub fn load(path: &str, options: &EngineOptions) -> Result<Self> {
        let builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(options.intra_threads)?;

        // CUDA is opt-in at build time; registration failures fall back to CPU.
        #[cfg(feature = "cuda")]
        let builder = {
            use ort::execution_providers::CUDAExecutionProvider;
            let cuda = CUDAExecutionProvider::default().build();
            match builder.clone().with_execution_providers([cuda]) {
                Ok(with_cuda) => with_cuda,
                Err(e) => {
                    warn!("CUDA execution provider unavailable, using CPU: {}", e);
                    builder
                }
            }
        };

        let session = builder.commit_from_file(path)?;

        let (names, imgsz) = {
            let metadata = session.metadata()?;
            (metadata.custom("names")?, metadata.custom("imgsz")?)
        };

        let labels = match &options.labels_file {
            Some(file) => load_labels_file(file)?,
            None => match names.as_deref().and_then(parse_names_metadata) {
                Some(labels) => labels,
                None => {
                    warn!("Model {} has no class names in its metadata, assuming COCO", path);
                    coco_labels()
                }
            },
        };

        let side = options.params.input_size;
        let (input_w, input_h) = imgsz.as_deref().and_then(parse_imgsz_metadata).unwrap_or((side, side));

        info!("ONNX session ready: {} ({} classes, input {}x{})", path, labels.len(), input_w, input_h);

        Ok(Self {
            session: Mutex::new(session),
            labels,
            input_w,
            input_h,
            params: options.params.clone(),
        })
    }

    fn run(&self, rgb: &RgbImage) -> Result<Vec<RawDetection>> {
        let (input, letterbox) = letterbox_tensor(rgb, self.input_w, self.input_h);

        let input_shape = vec![1, 3, self.input_h as i64, self.input_w as i64];
        let (data, _) = input.into_raw_vec_and_offset();
        let input_tensor = Tensor::from_array((input_shape, data))?;

        let mut session = self.session.lock().map_err(|_| anyhow!("ONNX session lock poisoned"))?;
        let outputs = session.run(ort::inputs![input_tensor])?;
        let (shape_out, data_out) = outputs[0].try_extract_tensor::<f32>()?;

        let dims: Vec<usize> = shape_out.iter().map(|&x| x as usize).collect();
        decode_output(&dims, data_out, self.labels.len(), &self.params, &letterbox)
    }
}

/// Turns the raw `[1, 4 + nc, N]` (or `[1, N, 4 + nc]`) output tensor into
/// candidates in original-image pixels.
pub fn decode_output(
    dims: &[usize],
    data: &[f32],
    num_classes: usize,
    params: &YoloParams,
    letterbox: &Letterbox,
) -> Result<Vec<RawDetection>> {
    if dims.len() != 3 || dims[0] == 0 {
        bail!("unexpected output shape {:?}, expected [1, 4 + classes, candidates]", dims);
    }
    let array_view = ArrayViewD::from_shape(IxDyn(dims), data)?;
    let view = array_view.index_axis(Axis(0), 0).into_dimensionality::<Ix2>()?;
    let view = if is_channels_first(view.shape(), num_classes) {
        view
    } else {
        view.reversed_axes()
    };

    let mut detections = decode_predictions(view, params);
    for det in &mut detections {
        det.bbox = letterbox.unmap(det.bbox);
    }
    Ok(detections)
}

impl InferencePort for OnnxYoloEngine {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn infer(&self, image: &RgbImage) -> DomainResult<Vec<RawDetection>> {
        self.run(image).map_err(|e| DomainError::Inference(format!("{:#}", e)))
    }
}

pub struct OnnxModelLoader {
    options: EngineOptions,
}

impl OnnxModelLoader {
    pub fn new(options: EngineOptions) -> Self {
        Self { options }
    }
}

impl ModelLoaderPort for OnnxModelLoader {
    fn load(&self, model: &ModelId) -> DomainResult<Arc<dyn InferencePort>> {
        let engine = OnnxYoloEngine::load(&model.onnx_path, &self.options)
            .map_err(|e| DomainError::ModelLoad(format!("{}: {:#}", model.onnx_path, e)))?;
        Ok(Arc::new(engine))
    }
}
