// Tier models: feature matrices, decision trees, random forests, k-means.

pub mod features;
pub mod forest;
pub mod kmeans;
pub mod tree;

use crate::dataset::record::Tier;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("dataset is empty")]
    EmptyDataset,

    #[error("label set has {distinct} distinct tier(s); at least 2 are required")]
    DegenerateLabels { distinct: usize },

    #[error("missing value at row {row}, feature {feature}")]
    MissingValues { row: usize, feature: usize },

    #[error("row {row} has {got} features, expected {expected}")]
    DimensionMismatch {
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("{features} feature rows but {labels} labels")]
    LengthMismatch { features: usize, labels: usize },

    #[error("need at least {needed} records, got {got}")]
    TooFewRecords { needed: usize, got: usize },

    #[error("cannot split {records} records into {folds} folds (need 2 <= k <= n)")]
    InvalidFolds { folds: usize, records: usize },

    #[error("invalid parameter `{name}`: {message}")]
    InvalidParameter { name: &'static str, message: String },
}

/// A fitted model that assigns a tier to one feature row.
pub trait Classifier {
    fn predict(&self, row: &[f64]) -> Tier;

    fn predict_all(&self, rows: &[Vec<f64>]) -> Vec<Tier> {
        rows.iter().map(|r| self.predict(r)).collect()
    }
}

/// Hyperparameters that can fit a classifier. Validation and grid search
/// work against this seam so they do not care which model is inside.
pub trait Trainer {
    type Model: Classifier;

    fn train(&self, features: &[Vec<f64>], labels: &[Tier]) -> Result<Self::Model, ModelError>;
}

/// Reject empty, ragged, or non-finite feature matrices.
pub fn check_features(features: &[Vec<f64>]) -> Result<usize, ModelError> {
    let first = features.first().ok_or(ModelError::EmptyDataset)?;
    let width = first.len();
    if width == 0 {
        return Err(ModelError::InvalidParameter {
            name: "features",
            message: "feature rows are empty".into(),
        });
    }
    for (row, values) in features.iter().enumerate() {
        if values.len() != width {
            return Err(ModelError::DimensionMismatch {
                row,
                expected: width,
                got: values.len(),
            });
        }
        if let Some(feature) = values.iter().position(|v| !v.is_finite()) {
            return Err(ModelError::MissingValues { row, feature });
        }
    }
    Ok(width)
}

/// Reject label sets that cannot support classification.
pub fn check_labels(features: &[Vec<f64>], labels: &[Tier]) -> Result<(), ModelError> {
    if features.len() != labels.len() {
        return Err(ModelError::LengthMismatch {
            features: features.len(),
            labels: labels.len(),
        });
    }
    let distinct = distinct_tiers(labels);
    if distinct < 2 {
        return Err(ModelError::DegenerateLabels { distinct });
    }
    Ok(())
}

pub fn distinct_tiers(labels: &[Tier]) -> usize {
    Tier::ALL
        .into_iter()
        .filter(|t| labels.contains(t))
        .count()
}

/// Index of the largest count; ties go to the lowest index.
pub(crate) fn argmax(counts: &[usize]) -> usize {
    let mut best = 0;
    for (i, &c) in counts.iter().enumerate() {
        if c > counts[best] {
            best = i;
        }
    }
    best
}
