//! ML Model Inference Engine
//!
//! Holds the frozen model together with the column order it expects and runs
//! a single prediction call over a reconciled table.

use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use std::time::Instant;

use super::{artifact::ModelArtifact, models::MLModel, FeatureVector, ModelMetadata};
use crate::domain::features::{FeatureSchema, FeatureTable};

/// Where the expected column order came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSource {
    /// The artifact's `feature_names_in_`
    Artifact,
    /// Declared schema order, for artifacts that do not record one
    Schema,
}

pub struct InferenceEngine {
    metadata: ModelMetadata,
    model: Box<dyn MLModel>,
    expected: Vec<String>,
    feature_source: FeatureSource,
}

impl std::fmt::Debug for InferenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceEngine")
            .field("metadata", &self.metadata)
            .field("expected", &self.expected)
            .field("feature_source", &self.feature_source)
            .finish_non_exhaustive()
    }
}

impl InferenceEngine {
    pub fn new(
        metadata: ModelMetadata,
        model: Box<dyn MLModel>,
        schema: &FeatureSchema,
    ) -> Result<Self> {
        let (expected, feature_source) = match &metadata.feature_names {
            Some(names) => (names.clone(), FeatureSource::Artifact),
            None => (schema.columns(), FeatureSource::Schema),
        };

        if expected.len() != model.n_features() {
            anyhow::bail!(
                "model takes {} features but {} columns are known for it",
                model.n_features(),
                expected.len()
            );
        }

        Ok(Self {
            metadata,
            model,
            expected,
            feature_source,
        })
    }

    /// Load and restore an artifact from disk
    pub fn load(path: impl AsRef<Path>, schema: &FeatureSchema) -> Result<Self> {
        let (metadata, model) = ModelArtifact::load(path)?.into_model()?;
        Self::new(metadata, model, schema)
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    /// Training-time column order
    pub fn expected_columns(&self) -> &[String] {
        &self.expected
    }

    pub fn feature_source(&self) -> FeatureSource {
        self.feature_source
    }

    /// One prediction per row, from a single call into the model
    pub fn predict(&self, table: &FeatureTable) -> Result<Vec<f64>> {
        if table.columns() != self.expected.as_slice() {
            anyhow::bail!(
                "Input columns do not match the model's training-time feature list ({} given, {} expected)",
                table.columns().len(),
                self.expected.len()
            );
        }

        let start = Instant::now();
        let rows: Vec<FeatureVector> = table
            .rows()
            .iter()
            .map(|r| FeatureVector::from_values(r))
            .collect();

        let predictions = self.model.predict_batch(&rows)?;

        if predictions.len() != rows.len() {
            anyhow::bail!(
                "Model returned {} predictions for {} rows",
                predictions.len(),
                rows.len()
            );
        }
        if let Some(idx) = predictions.iter().position(|p| !p.is_finite()) {
            anyhow::bail!("Model produced a non-finite prediction for row {}", idx + 1);
        }

        tracing::debug!(
            model_id = %self.metadata.model_id,
            rows = rows.len(),
            duration_us = start.elapsed().as_micros() as u64,
            "model inference"
        );
        Ok(predictions)
    }
}
