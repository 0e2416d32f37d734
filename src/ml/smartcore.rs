//! SmartCore RandomForest Wrapper
//!
//! Restores a `RandomForestRegressor` that was fitted and bincode-encoded
//! elsewhere. Only available with the `ml` feature.

use super::models::MLModel;
use super::{FeatureVector, ModelType};
use anyhow::Result;

use smartcore::ensemble::random_forest_regressor::RandomForestRegressor;
use smartcore::linalg::basic::matrix::DenseMatrix;

type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// SmartCore RandomForest Model Wrapper
pub struct SmartcoreRandomForest {
    model: Forest,
    n_features: usize,
}

impl std::fmt::Debug for SmartcoreRandomForest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmartcoreRandomForest")
            .field("n_features", &self.n_features)
            .finish_non_exhaustive()
    }
}

impl SmartcoreRandomForest {
    pub fn new(model: Forest, n_features: usize) -> Self {
        Self { model, n_features }
    }

    /// Restore a forest from bincode bytes stored in a model artifact
    pub fn from_bytes(bytes: &[u8], n_features: usize) -> Result<Self> {
        if n_features == 0 {
            anyhow::bail!("RandomForest artifact declares zero features");
        }
        let model: Forest = bincode::deserialize(bytes)
            .map_err(|e| anyhow::anyhow!("Failed to deserialize model: {}", e))?;
        Ok(Self::new(model, n_features))
    }

    /// Encode the forest the way artifacts store it
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(&self.model).map_err(|e| anyhow::anyhow!("Failed to serialize model: {}", e))
    }

    fn to_matrix(&self, rows: &[FeatureVector]) -> Result<DenseMatrix<f64>> {
        let mut flat = Vec::with_capacity(rows.len() * self.n_features);
        for row in rows {
            row.check_width(self.n_features)?;
            flat.extend_from_slice(&row.features);
        }
        Ok(DenseMatrix::new(rows.len(), self.n_features, flat, false))
    }
}

impl MLModel for SmartcoreRandomForest {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, features: &FeatureVector) -> Result<f64> {
        let predictions = self.predict_batch(std::slice::from_ref(features))?;
        predictions
            .first()
            .copied()
            .ok_or_else(|| anyhow::anyhow!("Model returned empty predictions"))
    }

    fn predict_batch(&self, rows: &[FeatureVector]) -> Result<Vec<f64>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let x = self.to_matrix(rows)?;
        self.model
            .predict(&x)
            .map_err(|e| anyhow::anyhow!("Prediction failed: {:?}", e))
    }

    fn model_type(&self) -> ModelType {
        ModelType::RandomForest
    }
}
