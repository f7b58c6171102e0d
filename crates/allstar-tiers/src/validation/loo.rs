// Leave-one-out validation.

use crate::dataset::record::Tier;
use crate::model::{check_features, check_labels, ModelError, Trainer};
use crate::validation::fit_and_predict;
use crate::validation::metrics::accuracy;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaveOneOut {
    /// One held-out prediction per record, in input order.
    pub predictions: Vec<Tier>,
    pub accuracy: f64,
}

/// Fit n models, each on all records but one, and predict the one left out.
pub fn leave_one_out<T: Trainer>(
    features: &[Vec<f64>],
    labels: &[Tier],
    trainer: &T,
) -> Result<LeaveOneOut, ModelError> {
    check_features(features)?;
    check_labels(features, labels)?;
    let n = features.len();
    if n < 2 {
        return Err(ModelError::TooFewRecords { needed: 2, got: n });
    }

    let mut predictions = Vec::with_capacity(n);
    for held_out in 0..n {
        let train: Vec<usize> = (0..n).filter(|&i| i != held_out).collect();
        let predicted = fit_and_predict(trainer, features, labels, &train, &[held_out])?;
        predictions.extend(predicted);
    }

    let accuracy = accuracy(labels, &predictions);
    debug!("leave-one-out accuracy {:.3} over {} records", accuracy, n);
    Ok(LeaveOneOut {
        predictions,
        accuracy,
    })
}
