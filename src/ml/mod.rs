//! Machine Learning Module
//!
//! Inference-only support for the frozen solar output model:
//! - artifact loading (JSON on local disk, read once at startup)
//! - estimator implementations (linear, decision-tree ensemble, smartcore forest)
//! - the inference invoker that turns a reconciled table into predictions
//!
//! Training happens elsewhere; nothing here updates a model.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::domain::features::FeatureValue;

pub mod artifact;
pub mod inference;
pub mod models;

#[cfg(feature = "ml")]
pub mod smartcore;

/// ML Model Type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModelType {
    LinearRegression,
    TreeEnsemble,
    RandomForest,
}

/// ML Model Metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_id: String,
    pub model_type: ModelType,
    pub version: String,
    pub trained_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Name of the predicted quantity
    pub target: String,
    pub unit: String,
    /// Training-time column order, when the artifact recorded it
    pub feature_names: Option<Vec<String>>,
    pub validation_metrics: Option<ValidationMetrics>,
}

/// Validation Metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub mae: f64,  // Mean Absolute Error
    pub rmse: f64, // Root Mean Square Error
    pub mape: f64, // Mean Absolute Percentage Error
    pub r2: f64,   // R-squared
}

/// One row of model input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub features: Vec<f64>,
}

impl FeatureVector {
    pub fn new(features: Vec<f64>) -> Self {
        Self { features }
    }

    /// Numeric view of a reconciled row
    pub fn from_values(values: &[FeatureValue]) -> Self {
        Self {
            features: values.iter().map(FeatureValue::as_f64).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Fail unless the row is exactly `expected` wide
    pub fn check_width(&self, expected: usize) -> Result<()> {
        if self.features.len() != expected {
            anyhow::bail!(
                "Feature count mismatch: expected {}, got {}",
                expected,
                self.features.len()
            );
        }
        Ok(())
    }
}
