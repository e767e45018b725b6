mod adapters;
mod application;
mod config;
mod domain;

use clap::Parser;
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info};

use crate::adapters::{
    http::{cors_layer, router, state::HttpState, upload_limit},
    onnx::{
        model_catalog::OnnxModelCatalog,
        yolo_engine::{EngineOptions, OnnxModelLoader},
    },
    render::annotator::ImageAnnotator,
};
use crate::application::{ports::AnnotatorPort, services::DetectorService};
use crate::config::Config;
use crate::domain::model::ModelId;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Logs (RUST_LOG=info by default)
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let config = Config::parse();
    info!("🔧 Initializing adapters...");

    // 2. Adapters
    let catalog = Arc::new(OnnxModelCatalog::new(&config.models_dir));
    let loader = Arc::new(OnnxModelLoader::new(EngineOptions {
        intra_threads: config.intra_threads,
        labels_file: config.labels.clone(),
        ..EngineOptions::default()
    }));
    let annotator: Option<Arc<dyn AnnotatorPort>> = if config.no_annotate {
        None
    } else {
        Some(Arc::new(ImageAnnotator::new(config.font.as_deref())))
    };

    // 3. Detector service, owned here and handed to the HTTP layer
    let detector = Arc::new(DetectorService::new(catalog, loader, annotator));

    // 4. Load the model in the background so `/` answers while weights load
    {
        let detector = detector.clone();
        let model = ModelId::named(config.model.clone());
        tokio::spawn(async move {
            if let Err(e) = detector.load(model).await {
                error!("Detection requests will fail until restart: {}", e);
            }
        });
    }

    // 5. Router
    let mut app = router(HttpState { detector });
    if let Some(dir) = &config.static_dir {
        info!("📂 Serving static files from {}", dir.display());
        app = app.fallback_service(ServeDir::new(dir));
    }
    let app = app
        .layer(upload_limit(config.max_upload_bytes))
        .layer(cors_layer(&config.cors_origins)?)
        .layer(TraceLayer::new_for_http());

    // 6. Serve
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 VisionGuard API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
