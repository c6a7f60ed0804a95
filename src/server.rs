// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! Single-shot detection over HTTP
//!
//! - `GET /`        health message
//! - `POST /detect` multipart `file` → `{"predictions": [{class, score, bbox: [x, y, w, h]}]}`
//!
//! Only allow-listed classes at or above the server threshold are returned.
//! Browsers on the configured origins get CORS headers.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use axum::extract::{DefaultBodyLimit, Multipart, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::detection::Detection;
use crate::models::ObjectDetector;

const MAX_UPLOAD: usize = 32 * 1024 * 1024;

/// Response filtering and CORS
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub allowed_classes: Vec<String>,
    pub threshold: f32,
    pub cors_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            allowed_classes: vec!["person".into(), "car".into(), "bear".into()],
            threshold: 0.1,
            cors_origins: vec!["http://localhost:8000".into(), "http://127.0.0.1:8000".into()],
        }
    }
}

impl ServerSettings {
    pub fn origin_allowed(&self, origin: &str) -> bool {
        self.cors_origins.iter().any(|o| o == origin)
    }
}

#[derive(Clone)]
pub struct AppState {
    detector: Arc<Mutex<Box<dyn ObjectDetector>>>,
    settings: Arc<ServerSettings>,
}

impl AppState {
    pub fn new(detector: Box<dyn ObjectDetector>, settings: ServerSettings) -> Self {
        Self {
            detector: Arc::new(Mutex::new(detector)),
            settings: Arc::new(settings),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub class: String,
    pub score: f32,
    pub bbox: [f32; 4], // x, y, width, height
}

#[derive(Debug, Serialize)]
pub struct DetectResponse {
    pub predictions: Vec<Prediction>,
}

/// Allow-listed, thresholded detections in response form
pub fn to_predictions(dets: &[Detection], settings: &ServerSettings) -> Vec<Prediction> {
    dets.iter()
        .filter(|d| d.confidence >= settings.threshold)
        .filter(|d| settings.allowed_classes.iter().any(|c| *c == d.class_name))
        .map(|d| Prediction {
            class: d.class_name.clone(),
            score: d.confidence,
            bbox: d.bbox.to_xywh(),
        })
        .collect()
}

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "bear-sentinel detection server is running." }))
}

async fn detect(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<DetectResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {}", e)))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("upload failed: {}", e)))?;
            upload = Some(bytes);
            break;
        }
    }
    let bytes = upload.ok_or_else(|| ApiError::bad_request("missing multipart field `file`"))?;

    let frame = image::load_from_memory(&bytes)
        .map_err(|e| {
            warn!("⚠️ rejected upload: {}", e);
            ApiError::bad_request(format!("invalid image: {}", e))
        })?
        .to_rgb8();
    debug!("📥 /detect {}x{}", frame.width(), frame.height());

    let detector = Arc::clone(&state.detector);
    let dets = tokio::task::spawn_blocking(move || {
        let mut detector = detector
            .lock()
            .map_err(|_| anyhow!("detector lock poisoned"))?;
        detector.infer(&frame)
    })
    .await
    .map_err(|e| ApiError::internal(format!("inference task failed: {}", e)))?
    .map_err(|e| {
        error!("❌ inference failed: {:#}", e);
        ApiError::internal(format!("inference failed: {:#}", e))
    })?;

    Ok(Json(DetectResponse {
        predictions: to_predictions(&dets, &state.settings),
    }))
}

/// CORS headers for allow-listed origins; OPTIONS preflights end here
async fn cors(State(settings): State<Arc<ServerSettings>>, req: Request, next: Next) -> Response {
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .filter(|o| settings.origin_allowed(o))
        .map(str::to_string);

    if req.method() == Method::OPTIONS {
        let Some(origin) = origin else {
            return (StatusCode::BAD_REQUEST, "Disallowed CORS origin").into_response();
        };
        let requested_headers = req
            .headers()
            .get(header::ACCESS_CONTROL_REQUEST_HEADERS)
            .cloned();
        let mut resp = StatusCode::NO_CONTENT.into_response();
        let headers = resp.headers_mut();
        apply_cors(headers, &origin);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, OPTIONS"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            requested_headers.unwrap_or_else(|| HeaderValue::from_static("*")),
        );
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("600"));
        return resp;
    }

    let mut resp = next.run(req).await;
    if let Some(origin) = origin {
        apply_cors(resp.headers_mut(), &origin);
    }
    resp
}

fn apply_cors(headers: &mut HeaderMap, origin: &str) {
    if let Ok(value) = HeaderValue::from_str(origin) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        headers.insert(header::VARY, HeaderValue::from_static("Origin"));
    }
}

pub fn router(state: AppState) -> Router {
    let settings = Arc::clone(&state.settings);
    Router::new()
        .route("/", get(root))
        .route("/detect", post(detect))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD))
        .layer(middleware::from_fn_with_state(settings, cors))
        .with_state(state)
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("🌐 detection server listening on http://{}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
