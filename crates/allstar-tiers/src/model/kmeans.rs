// K-Means clustering (Lloyd iterations) with random or k-means++ seeding.

use crate::dataset::record::Tier;
use crate::model::{check_features, ModelError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KMeansInit {
    /// k distinct rows chosen uniformly.
    Random,
    /// D² weighted seeding.
    #[default]
    #[serde(rename = "kmeans_plus_plus", alias = "k_means_plus_plus")]
    KMeansPlusPlus,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KMeansParams {
    pub k: usize,
    pub max_iterations: usize,
    pub init: KMeansInit,
    pub seed: u64,
}

impl Default for KMeansParams {
    fn default() -> Self {
        Self {
            k: 3,
            max_iterations: 300,
            init: KMeansInit::KMeansPlusPlus,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KMeansResult {
    /// Cluster index per input row.
    pub assignments: Vec<usize>,
    pub centroids: Vec<Vec<f64>>,
    pub iterations: usize,
    /// False when `max_iterations` ran out before assignments settled.
    pub converged: bool,
    /// Sum of squared distances from each row to its centroid.
    pub inertia: f64,
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Nearest centroid; ties go to the lowest cluster index.
fn nearest(row: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (c, centroid) in centroids.iter().enumerate() {
        let d = squared_distance(row, centroid);
        if d < best_dist {
            best = c;
            best_dist = d;
        }
    }
    best
}

fn init_random(features: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    rand::seq::index::sample(rng, features.len(), k)
        .iter()
        .map(|i| features[i].clone())
        .collect()
}

fn init_plus_plus(features: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let n = features.len();
    let mut centroids = Vec::with_capacity(k);
    centroids.push(features[rng.gen_range(0..n)].clone());

    let mut d2: Vec<f64> = features
        .iter()
        .map(|row| squared_distance(row, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = d2.iter().sum();
        let next = if total > 0.0 {
            let target = rng.gen::<f64>() * total;
            let mut acc = 0.0;
            let mut pick = n - 1;
            for (i, &d) in d2.iter().enumerate() {
                acc += d;
                if acc > target && d > 0.0 {
                    pick = i;
                    break;
                }
            }
            pick
        } else {
            // every row sits on a centroid already
            rng.gen_range(0..n)
        };

        let centroid = features[next].clone();
        for (dist, row) in d2.iter_mut().zip(features) {
            *dist = dist.min(squared_distance(row, &centroid));
        }
        centroids.push(centroid);
    }
    centroids
}

/// Cluster `features` into `params.k` groups. Hitting the iteration cap is
/// not an error: the latest assignment comes back with `converged = false`.
pub fn fit(features: &[Vec<f64>], params: &KMeansParams) -> Result<KMeansResult, ModelError> {
    let width = check_features(features)?;
    if params.k == 0 {
        return Err(ModelError::InvalidParameter {
            name: "k",
            message: "must be at least 1".into(),
        });
    }
    if params.max_iterations == 0 {
        return Err(ModelError::InvalidParameter {
            name: "max_iterations",
            message: "must be at least 1".into(),
        });
    }
    let n = features.len();
    if n < params.k {
        return Err(ModelError::TooFewRecords {
            needed: params.k,
            got: n,
        });
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut centroids = match params.init {
        KMeansInit::Random => init_random(features, params.k, &mut rng),
        KMeansInit::KMeansPlusPlus => init_plus_plus(features, params.k, &mut rng),
    };

    let mut assignments = vec![usize::MAX; n];
    let mut iterations = 0;
    let mut converged = false;

    for iter in 1..=params.max_iterations {
        iterations = iter;
        let mut changed = false;
        for (slot, row) in assignments.iter_mut().zip(features) {
            let c = nearest(row, &centroids);
            if *slot != c {
                *slot = c;
                changed = true;
            }
        }
        if !changed {
            converged = true;
            break;
        }

        let mut sums = vec![vec![0.0; width]; params.k];
        let mut counts = vec![0usize; params.k];
        for (&c, row) in assignments.iter().zip(features) {
            counts[c] += 1;
            for (s, v) in sums[c].iter_mut().zip(row) {
                *s += v;
            }
        }
        for (c, (sum, count)) in sums.into_iter().zip(&counts).enumerate() {
            // an empty cluster keeps its previous centroid
            if *count > 0 {
                centroids[c] = sum.into_iter().map(|s| s / *count as f64).collect();
            }
        }
    }

    if !converged {
        warn!(
            "k-means did not converge within {} iterations",
            params.max_iterations
        );
    }

    let inertia = assignments
        .iter()
        .zip(features)
        .map(|(&c, row)| squared_distance(row, &centroids[c]))
        .sum();
    debug!(
        "k-means k={} finished after {} iterations (converged={}, inertia={:.4})",
        params.k, iterations, converged, inertia
    );

    Ok(KMeansResult {
        assignments,
        centroids,
        iterations,
        converged,
        inertia,
    })
}

/// Map clusters to tiers by ranking centroids on `metric_column`, highest
/// first. With k = 3 the top cluster is MVP, the middle All-NBA, the bottom
/// All-Star; other k values spread ranks evenly over the three tiers.
pub fn cluster_tiers(result: &KMeansResult, metric_column: usize) -> Vec<Tier> {
    let k = result.centroids.len();
    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by(|&a, &b| {
        let va = result.centroids[a].get(metric_column).copied().unwrap_or(f64::NEG_INFINITY);
        let vb = result.centroids[b].get(metric_column).copied().unwrap_or(f64::NEG_INFINITY);
        vb.total_cmp(&va).then(a.cmp(&b))
    });

    let mut tier_of_cluster = vec![Tier::AllStar; k];
    for (rank, &cluster) in order.iter().enumerate() {
        let index = rank * Tier::COUNT / k.max(1);
        tier_of_cluster[cluster] = Tier::from_index(index).unwrap_or(Tier::AllStar);
    }

    result
        .assignments
        .iter()
        .map(|&c| tier_of_cluster.get(c).copied().unwrap_or(Tier::AllStar))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
