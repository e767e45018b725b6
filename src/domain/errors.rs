use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Model not ready: {0}")]
    NotReady(String),
    #[error("Failed to load model: {0}")]
    ModelLoad(String),
    #[error("Invalid image: {0}")]
    InvalidImage(String),
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

pub type DomainResult<T> = Result<T, DomainError>;
