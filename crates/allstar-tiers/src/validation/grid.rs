// Exhaustive grid search scored by k-fold accuracy.

use crate::dataset::record::Tier;
use crate::model::forest::{ForestParams, MaxFeatures};
use crate::model::{ModelError, Trainer};
use crate::validation::kfold::cross_validate;
use serde::Serialize;
use tracing::{debug, info};

/// Candidate values for each tunable forest parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForestGrid {
    pub n_trees: Vec<usize>,
    pub max_features: Vec<MaxFeatures>,
    pub max_depth: Vec<Option<usize>>,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for ForestGrid {
    fn default() -> Self {
        Self {
            n_trees: vec![50, 100, 200],
            max_features: vec![MaxFeatures::Sqrt, MaxFeatures::Log2, MaxFeatures::All],
            max_depth: vec![None, Some(3), Some(5)],
            min_samples_split: 2,
            seed: 42,
        }
    }
}

impl ForestGrid {
    /// Cartesian product, tree count outermost, depth innermost.
    pub fn candidates(&self) -> Vec<ForestParams> {
        let mut out =
            Vec::with_capacity(self.n_trees.len() * self.max_features.len() * self.max_depth.len());
        for &n_trees in &self.n_trees {
            for &max_features in &self.max_features {
                for &max_depth in &self.max_depth {
                    out.push(ForestParams {
                        n_trees,
                        max_features,
                        max_depth,
                        min_samples_split: self.min_samples_split,
                        seed: self.seed,
                    });
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridScore<T> {
    pub params: T,
    pub mean_accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridSearchResult<T> {
    pub best: T,
    pub best_score: f64,
    /// Every candidate in enumeration order.
    pub evaluated: Vec<GridScore<T>>,
}

/// Score every candidate with the same folds and keep the best. A later
/// candidate only replaces the leader by scoring strictly higher, so ties
/// go to the first in enumeration order.
pub fn grid_search<T: Trainer + Clone + std::fmt::Debug>(
    candidates: &[T],
    features: &[Vec<f64>],
    labels: &[Tier],
    folds: usize,
    seed: u64,
) -> Result<GridSearchResult<T>, ModelError> {
    if candidates.is_empty() {
        return Err(ModelError::InvalidParameter {
            name: "grid",
            message: "no candidate configurations".into(),
        });
    }

    let mut evaluated = Vec::with_capacity(candidates.len());
    let mut best: Option<(usize, f64)> = None;
    for (i, candidate) in candidates.iter().enumerate() {
        let cv = cross_validate(features, labels, folds, candidate, seed)?;
        debug!("candidate {:?}: {:.3}", candidate, cv.mean_accuracy);
        if best.map_or(true, |(_, score)| cv.mean_accuracy > score) {
            best = Some((i, cv.mean_accuracy));
        }
        evaluated.push(GridScore {
            params: candidate.clone(),
            mean_accuracy: cv.mean_accuracy,
        });
    }

    let (best_index, best_score) = best.ok_or(ModelError::EmptyDataset)?;
    info!(
        "grid search: best of {} candidates scored {:.3}",
        evaluated.len(),
        best_score
    );
    Ok(GridSearchResult {
        best: candidates[best_index].clone(),
        best_score,
        evaluated,
    })
}
