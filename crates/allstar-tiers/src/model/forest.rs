// Random forest: bagged CART trees with per-split feature subsampling.

use crate::dataset::record::Tier;
use crate::model::tree::{DecisionTree, TreeParams};
use crate::model::{argmax, check_features, check_labels, Classifier, ModelError, Trainer};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// How many features each split may look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    /// `floor(sqrt(n))`, at least 1.
    Sqrt,
    /// `floor(log2(n))`, at least 1.
    Log2,
    All,
}

impl MaxFeatures {
    pub fn resolve(self, n_features: usize) -> usize {
        let n = n_features as f64;
        let m = match self {
            MaxFeatures::Sqrt => n.sqrt().floor() as usize,
            MaxFeatures::Log2 => n.log2().floor() as usize,
            MaxFeatures::All => n_features,
        };
        m.clamp(1, n_features.max(1))
    }
}

impl fmt::Display for MaxFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MaxFeatures::Sqrt => "sqrt",
            MaxFeatures::Log2 => "log2",
            MaxFeatures::All => "all",
        })
    }
}

/// Forest hyperparameters. Fitting with the same parameters and data is
/// fully reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_features: MaxFeatures,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_features: MaxFeatures::Sqrt,
            max_depth: None,
            min_samples_split: 2,
            seed: 42,
        }
    }
}

impl fmt::Display for ForestParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "trees={} max_features={} max_depth={}",
            self.n_trees,
            self.max_features,
            self.max_depth
                .map_or_else(|| "none".to_string(), |d| d.to_string())
        )
    }
}

#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl RandomForest {
    pub fn fit(
        features: &[Vec<f64>],
        labels: &[Tier],
        params: &ForestParams,
    ) -> Result<Self, ModelError> {
        let n_features = check_features(features)?;
        check_labels(features, labels)?;
        if params.n_trees == 0 {
            return Err(ModelError::InvalidParameter {
                name: "n_trees",
                message: "must be at least 1".into(),
            });
        }

        let y: Vec<usize> = labels.iter().map(|t| t.index()).collect();
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split.max(2),
            max_features: params.max_features.resolve(n_features),
        };

        let n = features.len();
        let mut rng = StdRng::seed_from_u64(params.seed);
        let trees = (0..params.n_trees)
            .map(|_| {
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                DecisionTree::fit(features, &y, &bootstrap, tree_params, &mut rng)
            })
            .collect();

        debug!(
            "fitted forest ({}) on {} rows x {} features",
            params, n, n_features
        );
        Ok(Self { trees, n_features })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Votes per tier, indexed by `Tier::index`.
    pub fn votes(&self, row: &[f64]) -> [usize; Tier::COUNT] {
        let mut votes = [0; Tier::COUNT];
        for tree in &self.trees {
            votes[tree.predict_index(row)] += 1;
        }
        votes
    }

    /// Share of trees voting for the predicted tier.
    pub fn confidence(&self, row: &[f64]) -> f64 {
        let votes = self.votes(row);
        votes[argmax(&votes)] as f64 / self.trees.len().max(1) as f64
    }
}

impl Classifier for RandomForest {
    /// Majority vote; ties go to the higher tier.
    fn predict(&self, row: &[f64]) -> Tier {
        let votes = self.votes(row);
        Tier::from_index(argmax(&votes)).unwrap_or(Tier::AllStar)
    }
}

impl Trainer for ForestParams {
    type Model = RandomForest;

    fn train(&self, features: &[Vec<f64>], labels: &[Tier]) -> Result<RandomForest, ModelError> {
        RandomForest::fit(features, labels, self)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
