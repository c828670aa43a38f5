use crate::api::error::ApiError;
use crate::api::types::{FeatureSpec, HealthResponse, ModelResponse, ServiceStatus, SERVICE_NAME};
use crate::api::AppState;
use crate::domain::features::{Feature, FeatureVector};
use crate::domain::model::Prediction;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::Uri;
use axum::Json;
use serde_json::Value;

pub async fn index_handler() -> Json<ServiceStatus> {
    Json(ServiceStatus {
        status: "ok".to_string(),
        service: SERVICE_NAME.to_string(),
    })
}

pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_loaded: true,
        threshold: state.predictor.threshold(),
    })
}

pub async fn model_handler(State(state): State<AppState>) -> Json<ModelResponse> {
    Json(ModelResponse {
        features: Feature::ALL.into_iter().map(FeatureSpec::from).collect(),
        model: state.predictor.info(),
    })
}

/// `POST /predict`，body 以原始位元組讀入再自行解析，
/// 讓缺少 Content-Type 或格式錯誤都回傳一致的 JSON 錯誤
pub async fn predict_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Prediction>, ApiError> {
    let payload: Value = serde_json::from_slice(&body)
        .ok()
        .filter(Value::is_object)
        .ok_or_else(|| ApiError::bad_request("invalid or missing JSON body"))?;

    let features = payload
        .get("features")
        .filter(|v| !v.is_null())
        .ok_or_else(|| ApiError::bad_request("missing 'features' in request body"))?;

    let vector = FeatureVector::from_json(features)?;
    let prediction = state.predictor.predict(&vector)?;

    tracing::info!(
        "Prediction: {} (probability {:.4}, confidence {:.4})",
        prediction.prediction,
        prediction.probability,
        prediction.confidence
    );

    Ok(Json(prediction))
}

pub async fn not_found_handler(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("no route for {}", uri.path()))
}
