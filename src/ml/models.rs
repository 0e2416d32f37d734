//! ML Model Definitions
//!
//! Inference-only estimators that can be restored from a model artifact.

use super::{FeatureVector, ModelType};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Trait for ML models
pub trait MLModel: Send + Sync {
    /// Number of input columns the model was fitted on
    fn n_features(&self) -> usize;

    /// Predict a value from one row
    fn predict(&self, features: &FeatureVector) -> Result<f64>;

    /// Predict every row of a table in one call
    fn predict_batch(&self, rows: &[FeatureVector]) -> Result<Vec<f64>> {
        rows.iter().map(|row| self.predict(row)).collect()
    }

    fn model_type(&self) -> ModelType;
}

/// Simple Linear Regression Model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegressionModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearRegressionModel {
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Result<Self> {
        if coefficients.is_empty() {
            anyhow::bail!("Linear model has no coefficients");
        }
        if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
            anyhow::bail!("Linear model parameters must be finite");
        }
        Ok(Self {
            coefficients,
            intercept,
        })
    }
}

impl MLModel for LinearRegressionModel {
    fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    fn predict(&self, features: &FeatureVector) -> Result<f64> {
        features.check_width(self.coefficients.len())?;

        let prediction: f64 = features
            .features
            .iter()
            .zip(self.coefficients.iter())
            .map(|(f, c)| f * c)
            .sum::<f64>()
            + self.intercept;

        Ok(prediction)
    }

    fn model_type(&self) -> ModelType {
        ModelType::LinearRegression
    }
}

/// Node of a flattened decision tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    /// Rows with `x[feature] <= threshold` go to `left`
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// Decision tree stored as a flat node array; node 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Children must come after their parent, which also rules out cycles
    fn validate(&self, n_features: usize) -> Result<()> {
        if self.nodes.is_empty() {
            anyhow::bail!("Tree has no nodes");
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match *node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if feature >= n_features {
                        anyhow::bail!(
                            "Node {} splits on feature {} but the model has {} features",
                            idx,
                            feature,
                            n_features
                        );
                    }
                    if threshold.is_nan() {
                        anyhow::bail!("Node {} has a NaN threshold", idx);
                    }
                    for child in [left, right] {
                        if child <= idx || child >= self.nodes.len() {
                            anyhow::bail!("Node {} has invalid child index {}", idx, child);
                        }
                    }
                }
                TreeNode::Leaf { value } => {
                    if !value.is_finite() {
                        anyhow::bail!("Leaf {} has a non-finite value", idx);
                    }
                }
            }
        }
        Ok(())
    }

    fn evaluate(&self, x: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                TreeNode::Leaf { value } => return value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[feature] <= threshold { left } else { right };
                }
            }
        }
    }
}

/// How per-tree outputs combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// Random-forest style average
    Mean,
    /// Boosting style sum on top of `base_score`
    #[default]
    Sum,
}

/// Ensemble of decision trees (random forest or gradient boosting export)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsembleModel {
    pub n_features: usize,
    #[serde(default)]
    pub aggregation: Aggregation,
    #[serde(default)]
    pub base_score: f64,
    pub trees: Vec<DecisionTree>,
}

impl TreeEnsembleModel {
    pub fn new(
        n_features: usize,
        aggregation: Aggregation,
        base_score: f64,
        trees: Vec<DecisionTree>,
    ) -> Result<Self> {
        let model = Self {
            n_features,
            aggregation,
            base_score,
            trees,
        };
        model.validate()?;
        Ok(model)
    }

    /// Structural checks so that `predict` can index without bounds failures
    pub fn validate(&self) -> Result<()> {
        if self.n_features == 0 {
            anyhow::bail!("Tree ensemble declares zero features");
        }
        if self.trees.is_empty() {
            anyhow::bail!("Tree ensemble has no trees");
        }
        if !self.base_score.is_finite() {
            anyhow::bail!("Tree ensemble base score must be finite");
        }
        for (idx, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features)
                .map_err(|e| anyhow::anyhow!("Tree {}: {}", idx, e))?;
        }
        Ok(())
    }
}

impl MLModel for TreeEnsembleModel {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, features: &FeatureVector) -> Result<f64> {
        features.check_width(self.n_features)?;

        let total: f64 = self
            .trees
            .iter()
            .map(|tree| tree.evaluate(&features.features))
            .sum();

        let value = match self.aggregation {
            Aggregation::Sum => self.base_score + total,
            Aggregation::Mean => self.base_score + total / self.trees.len() as f64,
        };
        Ok(value)
    }

    fn model_type(&self) -> ModelType {
        ModelType::TreeEnsemble
    }
}
