use crate::core::identification::IdentificationService;
use crate::core::symptoms::{SymptomAnalyzer, SymptomAnswer, SymptomQuery};
use crate::domain::model::IdentifyRequest;
use crate::utils::error::{FinderError, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub const IDENTIFY_PATH: &str = "/api/identify-product";

pub const ASK_PATH: &str = "/api/ask";

/// 回應標頭：標示結果來自模型或示範資料
pub const PROVENANCE_HEADER: &str = "x-identification-source";

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<IdentificationService>,
    pub symptoms: Arc<SymptomAnalyzer>,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(service: Arc<IdentificationService>, symptoms: Arc<SymptomAnalyzer>) -> Self {
        Self {
            service,
            symptoms,
            startup_time: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(IDENTIFY_PATH, post(identify_product))
        .route(ASK_PATH, post(ask_symptoms))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// POST /api/identify-product
///
/// 請求本文自行解析：格式錯誤一律回 500 與通用訊息，而非框架預設的 4xx。
pub async fn identify_product(State(state): State<AppState>, body: Bytes) -> Result<Response> {
    let request: IdentifyRequest =
        serde_json::from_slice(&body).map_err(|e| FinderError::UnexpectedFailure {
            message: format!("malformed request body: {}", e),
        })?;

    tracing::debug!(
        "Identify request: query={:?}, image={}",
        request.query_text(),
        request.image_data().map(|i| i.len()).unwrap_or(0)
    );

    let identification = state.service.identify(&request).await?;

    let mut response = Json(identification.result).into_response();
    response.headers_mut().insert(
        PROVENANCE_HEADER,
        HeaderValue::from_static(identification.provenance.as_str()),
    );
    Ok(response)
}

/// POST /api/ask
///
/// 症狀轉搜尋關鍵字，永遠附上免責聲明。格式錯誤或缺少 query 回 400。
pub async fn ask_symptoms(State(state): State<AppState>, body: Bytes) -> Result<Json<SymptomAnswer>> {
    let request: SymptomQuery = serde_json::from_slice(&body)
        .map_err(|e| FinderError::invalid_request(format!("malformed request body: {}", e)))?;
    let query = request.validated()?;

    tracing::debug!("Symptom query: {} chars", query.chars().count());
    Ok(Json(state.symptoms.answer(query).await))
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);

    Json(HealthResponse {
        status: "ok".to_string(),
        module: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
    })
}

/// 綁定位址並持續服務，直到程序結束
pub async fn serve(addr: std::net::SocketAddr, state: AppState) -> Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("🚀 Listening on http://{}", addr);
    tracing::info!("   POST http://{}{}", addr, IDENTIFY_PATH);
    tracing::info!("   POST http://{}{}", addr, ASK_PATH);

    axum::serve(listener, app).await?;
    Ok(())
}
