//! Frozen model artifact
//!
//! A JSON document holding the estimator parameters, optional training-time
//! column order (`feature_names_in_`) and descriptive metadata. It is read
//! once at startup and never written by this service.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use super::models::{LinearRegressionModel, MLModel, TreeEnsembleModel};
use super::{ModelMetadata, ModelType, ValidationMetrics};

/// Estimator parameters, tagged by `type`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EstimatorSpec {
    Linear(LinearRegressionModel),
    TreeEnsemble(TreeEnsembleModel),
    /// bincode-encoded smartcore forest; needs the `ml` feature
    SmartcoreRandomForest { n_features: usize, model_bytes: Vec<u8> },
}

impl EstimatorSpec {
    fn model_type(&self) -> ModelType {
        match self {
            EstimatorSpec::Linear(_) => ModelType::LinearRegression,
            EstimatorSpec::TreeEnsemble(_) => ModelType::TreeEnsemble,
            EstimatorSpec::SmartcoreRandomForest { .. } => ModelType::RandomForest,
        }
    }

    fn into_model(self) -> Result<Box<dyn MLModel>> {
        match self {
            EstimatorSpec::Linear(m) => {
                Ok(Box::new(LinearRegressionModel::new(m.coefficients, m.intercept)?))
            }
            EstimatorSpec::TreeEnsemble(m) => {
                m.validate()?;
                Ok(Box::new(m))
            }
            #[cfg(feature = "ml")]
            EstimatorSpec::SmartcoreRandomForest {
                n_features,
                model_bytes,
            } => Ok(Box::new(super::smartcore::SmartcoreRandomForest::from_bytes(
                &model_bytes,
                n_features,
            )?)),
            #[cfg(not(feature = "ml"))]
            EstimatorSpec::SmartcoreRandomForest { .. } => {
                anyhow::bail!("smartcore_random_forest estimators require the 'ml' feature")
            }
        }
    }
}

fn default_version() -> String {
    "0.0.0".to_string()
}

fn default_target() -> String {
    crate::domain::features::PREDICTION_COLUMN.to_string()
}

fn default_unit() -> String {
    "W/m²".to_string()
}

/// Serialized frozen model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model_id: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub trained_at: Option<DateTime<Utc>>,
    #[serde(default = "default_target")]
    pub target: String,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(
        default,
        rename = "feature_names_in_",
        skip_serializing_if = "Option::is_none"
    )]
    pub feature_names_in: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_metrics: Option<ValidationMetrics>,
    pub estimator: EstimatorSpec,
}

impl ModelArtifact {
    /// Read an artifact from local disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read model artifact at {}", path.display()))?;
        Self::from_json(&text)
            .with_context(|| format!("invalid model artifact {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("failed to parse model artifact JSON")
    }

    /// Restore the estimator and check it against the recorded feature list
    pub fn into_model(self) -> Result<(ModelMetadata, Box<dyn MLModel>)> {
        let model_type = self.estimator.model_type();
        let model = self.estimator.into_model()?;

        if let Some(names) = &self.feature_names_in {
            if names.len() != model.n_features() {
                anyhow::bail!(
                    "feature_names_in_ lists {} columns but the estimator takes {}",
                    names.len(),
                    model.n_features()
                );
            }
            let mut seen = HashSet::with_capacity(names.len());
            for name in names {
                if name.is_empty() {
                    anyhow::bail!("feature_names_in_ contains an empty name");
                }
                if !seen.insert(name.as_str()) {
                    anyhow::bail!("feature_names_in_ lists '{}' twice", name);
                }
            }
        }

        let metadata = ModelMetadata {
            model_id: self.model_id,
            model_type,
            version: self.version,
            trained_at: self.trained_at,
            target: self.target,
            unit: self.unit,
            feature_names: self.feature_names_in,
            validation_metrics: self.validation_metrics,
        };
        Ok((metadata, model))
    }
}
