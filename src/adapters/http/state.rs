use std::sync::Arc;
use crate::application::services::DetectorService;

/// Shared state for the axum handlers. Built once by the composition root.
#[derive(Clone)]
pub struct HttpState {
    pub detector: Arc<DetectorService>,
}
