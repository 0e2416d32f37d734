use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::{
    api::{error::ApiError, response::ApiResponse},
    controller::AppState,
    domain::features::{FeatureValue, FieldSpec, PREDICTION_COLUMN},
    ml::{inference::FeatureSource, ModelType, ValidationMetrics},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/model", get(get_model))
        .route("/schema", get(get_schema))
        .route("/predict", post(predict))
}

/// Model information
#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub model_id: String,
    pub version: String,
    pub model_type: ModelType,
    pub trained_at: Option<DateTime<Utc>>,
    pub target: String,
    pub unit: String,
    pub expected_columns: Vec<String>,
    pub feature_source: FeatureSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_metrics: Option<ValidationMetrics>,
}

/// GET /api/v1/model - Loaded model and the column order it expects
pub async fn get_model(
    State(state): State<AppState>,
) -> Result<ApiResponse<ModelInfo>, ApiError> {
    let engine = state.controller.engine()?;
    let meta = engine.metadata();
    Ok(ApiResponse::success(ModelInfo {
        model_id: meta.model_id.clone(),
        version: meta.version.clone(),
        model_type: meta.model_type,
        trained_at: meta.trained_at,
        target: meta.target.clone(),
        unit: meta.unit.clone(),
        expected_columns: engine.expected_columns().to_vec(),
        feature_source: engine.feature_source(),
        validation_metrics: meta.validation_metrics,
    }))
}

#[derive(Debug, Serialize)]
pub struct SchemaInfo {
    pub fields: &'static [FieldSpec],
    pub prediction_column: &'static str,
}

/// GET /api/v1/schema - Declared feature table
pub async fn get_schema(State(state): State<AppState>) -> ApiResponse<SchemaInfo> {
    let fields = state.controller.schema().fields();
    ApiResponse::success(SchemaInfo {
        fields,
        prediction_column: PREDICTION_COLUMN,
    })
    .with_count(fields.len())
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<FeatureValue>>,
    pub predictions: Vec<f64>,
    /// Expected columns that were missing and filled with defaults
    pub filled: Vec<String>,
    /// Input columns the model does not use
    pub dropped: Vec<String>,
}

/// POST /api/v1/predict - Reconcile JSON rows and predict each one
pub async fn predict(
    State(state): State<AppState>,
    Json(req): Json<PredictRequest>,
) -> Result<ApiResponse<PredictResponse>, ApiError> {
    let start = Instant::now();
    let batch = state.controller.predict_records(&req.rows)?;
    let model_id = state.controller.engine()?.metadata().model_id.clone();

    let count = batch.predictions.len();
    let table = batch.reconciled.table;
    Ok(ApiResponse::success(PredictResponse {
        columns: table.columns().to_vec(),
        rows: table.rows().to_vec(),
        predictions: batch.predictions,
        filled: batch.reconciled.filled,
        dropped: batch.reconciled.dropped,
    })
    .with_count(count)
    .with_duration(start.elapsed().as_millis() as u64)
    .with_model(model_id))
}
