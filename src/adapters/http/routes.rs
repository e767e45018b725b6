use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::time::Instant;
use tracing::{error, info, warn};

use crate::adapters::http::{error::ApiError, state::HttpState};
use crate::application::dto::{DetectionResponse, HealthResponse, ReadinessResponse};
use crate::domain::{detection::summarize_detections, model::DetectorStatus};

const UPLOAD_FIELD: &str = "file";

pub async fn root() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

pub async fn readiness(State(st): State<HttpState>) -> impl IntoResponse {
    let snap = st.detector.snapshot();
    let code = if snap.status == DetectorStatus::Ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = ReadinessResponse {
        status: snap.status.as_str().to_string(),
        model: snap.model.unwrap_or_default(),
        detail: snap.detail,
    };
    (code, Json(body))
}

struct ImageUpload {
    file_name: String,
    bytes: Vec<u8>,
}

pub async fn detect_image(
    State(st): State<HttpState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DetectionResponse>, ApiError> {
    let mut multipart = multipart?;
    let upload = read_image_upload(&mut multipart).await?;

    info!("Processing image: {} ({} bytes)", upload.file_name, upload.bytes.len());
    let started = Instant::now();

    let response = st.detector.detect(upload.bytes).await.map_err(|e| {
        error!("Detection error: {}", e);
        ApiError::from(e)
    })?;

    info!(
        "Found {} objects [{}] in {} ms",
        response.detections.len(),
        summarize_detections(&response.detections),
        started.elapsed().as_millis()
    );
    Ok(Json(response))
}

/// Pulls the `file` part out of the form. The content type is checked before
/// the body is read so non-images never reach the detector.
async fn read_image_upload(multipart: &mut Multipart) -> Result<ImageUpload, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_ascii_lowercase();
        if !content_type.starts_with("image/") {
            warn!("Rejected upload with content type '{}'", content_type);
            return Err(ApiError::BadRequest("File must be an image".into()));
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let bytes = field.bytes().await?.to_vec();
        return Ok(ImageUpload { file_name, bytes });
    }
    Err(ApiError::BadRequest(format!("Missing '{}' file field", UPLOAD_FIELD)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::http::{router, upload_limit};
    use crate::application::{
        services::DetectorService,
        testing::{jpeg_bytes, png_bytes, FakeEngine, FakeLoader, JpegAnnotator, StaticCatalog},
    };
    use crate::domain::{detection::RawDetection, model::ModelId};
    use axum::{
        body::Body,
        http::{header, Method, Request},
        Router,
    };
    use base64::{prelude::BASE64_STANDARD, Engine};
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    const BOUNDARY: &str = "visionguard-test-boundary";

    async fn app_with(engine: Arc<FakeEngine>, loaded: bool) -> Router {
        let detector = Arc::new(DetectorService::new(
            Arc::new(StaticCatalog::found()),
            Arc::new(FakeLoader::new(engine)),
            Some(Arc::new(JpegAnnotator)),
        ));
        if loaded {
            detector.load(ModelId::named("yolov8n.pt")).await.unwrap();
        }
        router(HttpState { detector })
    }

    fn multipart_body(field: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"photo\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload(body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/detect/image")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_root_is_healthy() {
        let app = app_with(Arc::new(FakeEngine::new(vec![])), false).await;
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["message"], "VisionGuard API is running");
    }

    #[tokio::test]
    async fn test_readiness_follows_load_state() {
        let engine = Arc::new(FakeEngine::new(vec![]));

        let app = app_with(engine.clone(), false).await;
        let response = app
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await["status"], "unloaded");

        let app = app_with(engine, true).await;
        let response = app
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ready");
        assert_eq!(body["model"], "yolov8n.pt");
    }

    #[tokio::test]
    async fn test_text_upload_is_rejected_without_inference() {
        let engine = Arc::new(FakeEngine::new(vec![]));
        let app = app_with(engine.clone(), true).await;

        let response = app
            .oneshot(upload(multipart_body("file", "text/plain", b"hello")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["detail"], "File must be an image");
        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn test_truncated_jpeg_is_server_error() {
        let engine = Arc::new(FakeEngine::new(vec![]));
        let app = app_with(engine.clone(), true).await;

        let mut data = jpeg_bytes(64, 64);
        data.truncate(data.len() / 3);
        let response = app.oneshot(upload(multipart_body("file", "image/jpeg", &data))).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let detail = json_body(response).await["detail"].as_str().unwrap().to_string();
        assert!(detail.starts_with("Detection failed: Invalid image"), "{detail}");
        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_upload_is_invalid_image() {
        let app = app_with(Arc::new(FakeEngine::new(vec![])), true).await;
        let response = app.oneshot(upload(multipart_body("file", "image/png", b""))).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let detail = json_body(response).await["detail"].as_str().unwrap().to_string();
        assert!(detail.contains("Invalid image"), "{detail}");
    }

    #[tokio::test]
    async fn test_blank_canvas_returns_empty_detections_and_image() {
        let app = app_with(Arc::new(FakeEngine::new(vec![])), true).await;
        let response = app
            .oneshot(upload(multipart_body("file", "image/png", &png_bytes(96, 72))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["detections"], serde_json::json!([]));

        let encoded = body["annotated_image"].as_str().expect("annotated image");
        let jpeg = BASE64_STANDARD.decode(encoded).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (96, 72));
    }

    #[tokio::test]
    async fn test_person_detection_payload() {
        let engine = Arc::new(FakeEngine::new(vec![RawDetection {
            bbox: [210.0, 60.0, 420.0, 470.0],
            score: 0.88,
            class_id: 0,
        }]));
        let app = app_with(engine, true).await;

        let response = app
            .oneshot(upload(multipart_body("file", "image/jpeg", &jpeg_bytes(640, 480))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let detections = body["detections"].as_array().unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0]["class_name"], "person");
        assert!(detections[0]["confidence"].as_f64().unwrap() > 0.25);
        assert_eq!(detections[0]["bbox"].as_array().unwrap().len(), 4);
        assert!(detections[0].get("class_id").is_none());
        assert!(body["annotated_image"].is_string());
    }

    #[tokio::test]
    async fn test_detect_before_load_is_server_error() {
        let engine = Arc::new(FakeEngine::new(vec![]));
        let app = app_with(engine.clone(), false).await;

        let response = app
            .oneshot(upload(multipart_body("file", "image/png", &png_bytes(8, 8))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let detail = json_body(response).await["detail"].as_str().unwrap().to_string();
        assert!(detail.contains("Model not ready"), "{detail}");
        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn test_inference_failure_is_reported() {
        let app = app_with(Arc::new(FakeEngine::failing("CUDA out of memory")), true).await;
        let response = app
            .oneshot(upload(multipart_body("file", "image/png", &png_bytes(8, 8))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let detail = json_body(response).await["detail"].as_str().unwrap().to_string();
        assert!(detail.contains("CUDA out of memory"), "{detail}");
    }

    #[tokio::test]
    async fn test_missing_file_field_is_bad_request() {
        let engine = Arc::new(FakeEngine::new(vec![]));
        let app = app_with(engine.clone(), true).await;

        let response = app
            .oneshot(upload(multipart_body("image", "image/png", &png_bytes(8, 8))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["detail"].as_str().unwrap().contains("file"));
        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn test_oversized_upload_is_payload_too_large() {
        let engine = Arc::new(FakeEngine::new(vec![]));
        let app = app_with(engine.clone(), true).await.layer(upload_limit(Some(1024)));

        let response = app
            .oneshot(upload(multipart_body("file", "image/png", &vec![0u8; 8 * 1024])))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(json_body(response).await["detail"].is_string());
        assert_eq!(engine.calls(), 0);
    }

    #[tokio::test]
    async fn test_non_multipart_body_is_bad_request() {
        let app = app_with(Arc::new(FakeEngine::new(vec![])), true).await;
        let request = Request::builder()
            .method(Method::POST)
            .uri("/detect/image")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["detail"].is_string());
    }
}
