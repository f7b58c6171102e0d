// Stratified k-fold cross-validation.

use crate::dataset::record::Tier;
use crate::model::{check_features, check_labels, ModelError, Trainer};
use crate::validation::fit_and_predict;
use crate::validation::metrics::accuracy;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FoldScore {
    pub fold: usize,
    pub size: usize,
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossValidation {
    pub folds: Vec<FoldScore>,
    /// Unweighted mean of the fold accuracies.
    pub mean_accuracy: f64,
    /// Held-out prediction for every record, in input order.
    pub predictions: Vec<Tier>,
}

/// Partition record indices into `k` disjoint folds that together cover
/// every record once. Each tier is shuffled and dealt round-robin so fold
/// class balance mirrors the whole set; the deal counter runs across tiers
/// so fold sizes differ by at most one.
pub fn stratified_folds(labels: &[Tier], k: usize, seed: u64) -> Result<Vec<Vec<usize>>, ModelError> {
    let n = labels.len();
    if k < 2 || k > n {
        return Err(ModelError::InvalidFolds {
            folds: k,
            records: n,
        });
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut folds = vec![Vec::new(); k];
    let mut next = 0;
    for tier in Tier::ALL {
        let mut members: Vec<usize> = (0..n).filter(|&i| labels[i] == tier).collect();
        members.shuffle(&mut rng);
        for i in members {
            folds[next % k].push(i);
            next += 1;
        }
    }
    for fold in &mut folds {
        fold.sort_unstable();
    }
    Ok(folds)
}

/// Train on k-1 folds, score the held-out fold, rotate.
pub fn cross_validate<T: Trainer>(
    features: &[Vec<f64>],
    labels: &[Tier],
    k: usize,
    trainer: &T,
    seed: u64,
) -> Result<CrossValidation, ModelError> {
    check_features(features)?;
    check_labels(features, labels)?;
    let folds = stratified_folds(labels, k, seed)?;

    let mut predictions = vec![Tier::AllStar; labels.len()];
    let mut scores = Vec::with_capacity(k);
    for (f, test) in folds.iter().enumerate() {
        let train: Vec<usize> = folds
            .iter()
            .enumerate()
            .filter(|(g, _)| *g != f)
            .flat_map(|(_, fold)| fold.iter().copied())
            .collect();

        let predicted = fit_and_predict(trainer, features, labels, &train, test)?;
        let actual: Vec<Tier> = test.iter().map(|&i| labels[i]).collect();
        for (&i, &p) in test.iter().zip(&predicted) {
            predictions[i] = p;
        }
        scores.push(FoldScore {
            fold: f,
            size: test.len(),
            accuracy: accuracy(&actual, &predicted),
        });
    }

    let mean_accuracy = scores.iter().map(|s| s.accuracy).sum::<f64>() / scores.len() as f64;
    debug!("{}-fold mean accuracy {:.3}", k, mean_accuracy);
    Ok(CrossValidation {
        folds: scores,
        mean_accuracy,
        predictions,
    })
}
