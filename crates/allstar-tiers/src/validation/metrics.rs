// Confusion matrix, accuracy, and per-tier precision/recall.

use crate::dataset::record::Tier;
use serde::Serialize;

/// Counts indexed `[actual][predicted]` by `Tier::index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ConfusionMatrix {
    pub counts: [[usize; Tier::COUNT]; Tier::COUNT],
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub tier: Tier,
    /// `None` when the tier was never predicted.
    pub precision: Option<f64>,
    /// `None` when the tier never occurs in the actual labels.
    pub recall: Option<f64>,
    pub f1: Option<f64>,
    pub support: usize,
}

impl ConfusionMatrix {
    /// Pairs `actual` with `predicted` element-wise; extra elements in the
    /// longer slice are ignored.
    pub fn from_predictions(actual: &[Tier], predicted: &[Tier]) -> Self {
        let mut m = Self::default();
        for (a, p) in actual.iter().zip(predicted) {
            m.counts[a.index()][p.index()] += 1;
        }
        m
    }

    pub fn get(&self, actual: Tier, predicted: Tier) -> usize {
        self.counts[actual.index()][predicted.index()]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn correct(&self) -> usize {
        (0..Tier::COUNT).map(|i| self.counts[i][i]).sum()
    }

    /// Fraction of correct predictions; 0 for an empty matrix.
    pub fn accuracy(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.correct() as f64 / total as f64,
        }
    }

    pub fn class_metrics(&self) -> Vec<ClassMetrics> {
        Tier::ALL
            .iter()
            .map(|&tier| {
                let i = tier.index();
                let tp = self.counts[i][i];
                let predicted: usize = (0..Tier::COUNT).map(|a| self.counts[a][i]).sum();
                let support: usize = self.counts[i].iter().sum();

                let precision = (predicted > 0).then(|| tp as f64 / predicted as f64);
                let recall = (support > 0).then(|| tp as f64 / support as f64);
                let f1 = match (precision, recall) {
                    (Some(p), Some(r)) if p + r > 0.0 => Some(2.0 * p * r / (p + r)),
                    (Some(_), Some(_)) => Some(0.0),
                    _ => None,
                };
                ClassMetrics {
                    tier,
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect()
    }
}

pub fn accuracy(actual: &[Tier], predicted: &[Tier]) -> f64 {
    ConfusionMatrix::from_predictions(actual, predicted).accuracy()
}
