// Resampling validation and hyperparameter search over any `Trainer`.

pub mod grid;
pub mod kfold;
pub mod loo;
pub mod metrics;

use crate::dataset::record::Tier;
use crate::model::{distinct_tiers, Classifier, ModelError, Trainer};
use tracing::debug;

/// Train on `train` rows, predict `test` rows.
///
/// A training split that happens to hold a single tier (a rare class held
/// out entirely) cannot fit a classifier; every test row then gets that
/// tier, which is what any model trained on it would answer.
pub(crate) fn fit_and_predict<T: Trainer>(
    trainer: &T,
    features: &[Vec<f64>],
    labels: &[Tier],
    train: &[usize],
    test: &[usize],
) -> Result<Vec<Tier>, ModelError> {
    let train_x: Vec<Vec<f64>> = train.iter().map(|&i| features[i].clone()).collect();
    let train_y: Vec<Tier> = train.iter().map(|&i| labels[i]).collect();

    if distinct_tiers(&train_y) == 1 {
        let only = train_y[0];
        debug!(
            "training split has only {} rows; predicting it for {} held-out rows",
            only,
            test.len()
        );
        return Ok(vec![only; test.len()]);
    }

    let model = trainer.train(&train_x, &train_y)?;
    Ok(test.iter().map(|&i| model.predict(&features[i])).collect())
}
