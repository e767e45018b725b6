use clap::Parser;
use std::path::PathBuf;

/// Runtime configuration. Every flag can also come from a `VISIONGUARD_*`
/// environment variable.
#[derive(Parser, Debug, Clone)]
#[command(name = "visionguard", version, about = "Object detection over HTTP (YOLO on ONNX Runtime)")]
pub struct Config {
    #[arg(long, env = "VISIONGUARD_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "VISIONGUARD_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Model identifier: a path to an .onnx file or a name looked up in --models-dir
    #[arg(long, env = "VISIONGUARD_MODEL", default_value = "yolov8n.pt")]
    pub model: String,

    #[arg(long, env = "VISIONGUARD_MODELS_DIR", default_value = "models")]
    pub models_dir: PathBuf,

    /// Label file, one class per line; overrides the names embedded in the model
    #[arg(long, env = "VISIONGUARD_LABELS")]
    pub labels: Option<PathBuf>,

    /// TrueType font for box labels
    #[arg(long, env = "VISIONGUARD_FONT")]
    pub font: Option<PathBuf>,

    /// Allowed cross-origin sources, comma separated ("*" for any)
    #[arg(
        long,
        env = "VISIONGUARD_CORS_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:5173"
    )]
    pub cors_origins: Vec<String>,

    /// Directory served for paths no route matches (built frontend)
    #[arg(long, env = "VISIONGUARD_STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    #[arg(long, env = "VISIONGUARD_INTRA_THREADS", default_value_t = 4)]
    pub intra_threads: usize,

    /// Upload size cap in bytes, unlimited when unset
    #[arg(long, env = "VISIONGUARD_MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: Option<usize>,

    /// Skip rendering; responses carry `annotated_image: null`
    #[arg(long, env = "VISIONGUARD_NO_ANNOTATE")]
    pub no_annotate: bool,
}

impl Config {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
