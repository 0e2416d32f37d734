//! Prediction controller
//!
//! Owns the frozen model for the lifetime of the process and runs the
//! reconcile-then-infer pipeline for every kind of request.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};
use validator::ValidationErrors;

use crate::config::Config;
use crate::domain::features::{FeatureSchema, FeatureTable};
use crate::domain::manual::ManualInput;
use crate::export;
use crate::ingest::{self, Cell, RawTable, UploadError};
use crate::ml::inference::InferenceEngine;
use crate::reconcile::{reconcile, Reconciled, ReconcileError};

#[derive(Clone)]
pub struct AppState {
    pub cfg: Config,
    pub controller: Arc<PredictionController>,
}

impl AppState {
    /// Load the configured model. A broken artifact only stops startup
    /// when `model.required` is set.
    pub fn new(cfg: Config) -> Result<Self> {
        let controller = PredictionController::load(&cfg.model.path, FeatureSchema::solar());
        if let Some(reason) = controller.load_error() {
            if cfg.model.required {
                anyhow::bail!("model is required but unavailable: {}", reason);
            }
            warn!(path = %cfg.model.path.display(), %reason, "starting without a model");
        }
        Ok(Self::with_controller(cfg, controller))
    }

    pub fn with_controller(cfg: Config, controller: PredictionController) -> Self {
        Self {
            cfg,
            controller: Arc::new(controller),
        }
    }
}

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("Prediction failed: {0}")]
    Inference(String),
}

/// Result of the manual form
#[derive(Debug, Clone, PartialEq)]
pub struct ManualPrediction {
    pub value: f64,
    pub unit: String,
    pub message: String,
}

/// Result of an upload or a JSON batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPrediction {
    pub reconciled: Reconciled,
    pub predictions: Vec<f64>,
}

impl BatchPrediction {
    pub fn table(&self) -> &FeatureTable {
        &self.reconciled.table
    }

    pub fn to_csv(&self) -> Result<Vec<u8>, csv::Error> {
        export::to_csv(self.table(), &self.predictions)
    }
}

enum ModelSlot {
    Ready {
        engine: InferenceEngine,
        warm_up_ms: u64,
    },
    Unavailable(String),
}

pub struct PredictionController {
    schema: FeatureSchema,
    model: ModelSlot,
}

impl PredictionController {
    /// Load an artifact from disk and warm it up; failures are recorded, not returned
    pub fn load(path: impl AsRef<Path>, schema: FeatureSchema) -> Self {
        let path = path.as_ref();
        match InferenceEngine::load(path, &schema) {
            Ok(engine) => {
                info!(
                    path = %path.display(),
                    model_id = %engine.metadata().model_id,
                    model_type = %engine.metadata().model_type,
                    features = engine.expected_columns().len(),
                    "model loaded"
                );
                Self::from_engine(engine, schema)
            }
            Err(e) => {
                let reason = format!("{:#}", e);
                warn!(path = %path.display(), error = %reason, "model load failed");
                Self::unavailable(reason, schema)
            }
        }
    }

    /// Wrap an already restored engine, running the warm-up prediction
    pub fn from_engine(engine: InferenceEngine, schema: FeatureSchema) -> Self {
        let start = Instant::now();
        match Self::warm_up(&engine, &schema) {
            Ok(value) => {
                let warm_up_ms = start.elapsed().as_millis() as u64;
                info!(prediction = value, duration_ms = warm_up_ms, "model warm-up complete");
                Self {
                    schema,
                    model: ModelSlot::Ready { engine, warm_up_ms },
                }
            }
            Err(e) => {
                warn!(error = %e, "model warm-up failed");
                Self::unavailable(format!("warm-up prediction failed: {}", e), schema)
            }
        }
    }

    pub fn unavailable(reason: impl Into<String>, schema: FeatureSchema) -> Self {
        Self {
            schema,
            model: ModelSlot::Unavailable(reason.into()),
        }
    }

    /// Predict the default manual row once
    fn warm_up(engine: &InferenceEngine, schema: &FeatureSchema) -> Result<f64, PredictionError> {
        let table = manual_table(&ManualInput::default())?;
        let batch = run(engine, schema, &table)?;
        batch
            .predictions
            .first()
            .copied()
            .ok_or_else(|| PredictionError::Inference("warm-up returned no prediction".into()))
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.model, ModelSlot::Ready { .. })
    }

    pub fn load_error(&self) -> Option<&str> {
        match &self.model {
            ModelSlot::Ready { .. } => None,
            ModelSlot::Unavailable(reason) => Some(reason),
        }
    }

    pub fn warm_up_ms(&self) -> Option<u64> {
        match &self.model {
            ModelSlot::Ready { warm_up_ms, .. } => Some(*warm_up_ms),
            ModelSlot::Unavailable(_) => None,
        }
    }

    pub fn engine(&self) -> Result<&InferenceEngine, PredictionError> {
        match &self.model {
            ModelSlot::Ready { engine, .. } => Ok(engine),
            ModelSlot::Unavailable(reason) => Err(PredictionError::ModelUnavailable(reason.clone())),
        }
    }

    /// Validate the form, then predict its single row
    pub fn predict_manual(&self, input: &ManualInput) -> Result<ManualPrediction, PredictionError> {
        input.check()?;
        let engine = self.engine()?;
        let batch = run(engine, &self.schema, &manual_table(input)?)?;
        let value = batch
            .predictions
            .first()
            .copied()
            .ok_or_else(|| PredictionError::Inference("model returned no prediction".into()))?;

        let unit = engine.metadata().unit.clone();
        Ok(ManualPrediction {
            value,
            message: export::manual_message(value, &unit),
            unit,
        })
    }

    /// Parse an uploaded file and predict every row
    pub fn predict_upload(
        &self,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<BatchPrediction, PredictionError> {
        let table = ingest::parse_upload(file_name, bytes)?;
        self.predict_table(&table)
    }

    /// Predict JSON records, one row per object
    pub fn predict_records(
        &self,
        records: &[serde_json::Map<String, serde_json::Value>],
    ) -> Result<BatchPrediction, PredictionError> {
        let table = RawTable::from_json_rows(records)?;
        self.predict_table(&table)
    }

    pub fn predict_table(&self, table: &RawTable) -> Result<BatchPrediction, PredictionError> {
        if table.is_empty() {
            return Err(UploadError::NoRows.into());
        }
        run(self.engine()?, &self.schema, table)
    }
}

fn manual_table(input: &ManualInput) -> Result<RawTable, PredictionError> {
    Ok(RawTable::single_row(
        input
            .named_values()
            .into_iter()
            .map(|(column, value)| (column, Cell::from(value))),
    )?)
}

fn run(
    engine: &InferenceEngine,
    schema: &FeatureSchema,
    table: &RawTable,
) -> Result<BatchPrediction, PredictionError> {
    let start = Instant::now();
    let reconciled = reconcile(table, engine.expected_columns(), schema)?;
    let predictions = engine
        .predict(&reconciled.table)
        .map_err(|e| PredictionError::Inference(format!("{:#}", e)))?;

    info!(
        rows = predictions.len(),
        filled = reconciled.filled.len(),
        dropped = reconciled.dropped.len(),
        duration_ms = start.elapsed().as_millis() as u64,
        "prediction complete"
    );
    Ok(BatchPrediction {
        reconciled,
        predictions,
    })
}
