use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::application::ports::ModelCatalogPort;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::model::ModelId;

/// Resolves model identifiers to ONNX weight files.
///
/// An identifier is either a path to an `.onnx` file or a model name looked up
/// as `<models_dir>/<name>.onnx`. A `.pt` suffix is swapped for `.onnx`, so the
/// usual `yolov8n.pt` identifier finds its ONNX export.
pub struct OnnxModelCatalog {
    models_dir: PathBuf,
}

impl OnnxModelCatalog {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self { models_dir: models_dir.into() }
    }

    fn candidates(&self, identifier: &str) -> Vec<PathBuf> {
        let direct = PathBuf::from(identifier);
        let onnx = PathBuf::from(onnx_file_name(identifier));

        let mut out = Vec::new();
        if !has_suffix(identifier, ".pt") {
            out.push(direct.clone());
        }
        if onnx != direct {
            out.push(onnx.clone());
        }
        if let Some(file) = onnx.file_name() {
            out.push(self.models_dir.join(file));
        }
        out.dedup();
        out
    }
}

/// `name.pt` -> `name.onnx`, `name` -> `name.onnx`. Other dots are part of
/// the name.
fn onnx_file_name(identifier: &str) -> String {
    if has_suffix(identifier, ".onnx") {
        return identifier.to_string();
    }
    let stem = if has_suffix(identifier, ".pt") {
        &identifier[..identifier.len() - ".pt".len()]
    } else {
        identifier
    };
    format!("{}.onnx", stem)
}

fn has_suffix(identifier: &str, suffix: &str) -> bool {
    identifier.len() >= suffix.len()
        && identifier.is_char_boundary(identifier.len() - suffix.len())
        && identifier[identifier.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

#[async_trait]
impl ModelCatalogPort for OnnxModelCatalog {
    async fn resolve_model(&self, model: &ModelId) -> DomainResult<ModelId> {
        let identifier = model.name.trim();
        if identifier.is_empty() {
            return Err(DomainError::InvalidInput("model identifier is empty".into()));
        }

        let candidates = self.candidates(identifier);
        for candidate in &candidates {
            if is_file(candidate).await {
                return Ok(ModelId {
                    name: model.name.clone(),
                    onnx_path: candidate.to_string_lossy().into_owned(),
                });
            }
        }

        let tried: Vec<_> = candidates.iter().map(|p| p.display().to_string()).collect();
        Err(DomainError::NotFound(format!(
            "no ONNX weights for '{}' (tried {})",
            identifier,
            tried.join(", ")
        )))
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}
