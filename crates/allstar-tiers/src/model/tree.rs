// CART decision tree (Gini impurity) over a subset of training rows.

use crate::dataset::record::Tier;
use crate::model::argmax;
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    /// `None` grows until leaves are pure or too small to split.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    /// Features considered at each split.
    pub max_features: usize,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        class: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone)]
pub struct DecisionTree {
    root: Node,
}

struct Builder<'a, R: Rng> {
    x: &'a [Vec<f64>],
    y: &'a [usize],
    n_features: usize,
    params: TreeParams,
    rng: &'a mut R,
}

fn class_counts(y: &[usize], samples: &[usize]) -> [usize; Tier::COUNT] {
    let mut counts = [0; Tier::COUNT];
    for &i in samples {
        counts[y[i]] += 1;
    }
    counts
}

/// Gini impurity `1 - sum(p_k^2)`.
pub fn gini(counts: &[usize]) -> f64 {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / total;
            p * p
        })
        .sum::<f64>()
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

impl<'a, R: Rng> Builder<'a, R> {
    fn build(&mut self, samples: &[usize], depth: usize) -> Node {
        let counts = class_counts(self.y, samples);
        let leaf = Node::Leaf {
            class: argmax(&counts),
        };

        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        let depth_reached = self.params.max_depth.is_some_and(|d| depth >= d);
        if pure || depth_reached || samples.len() < self.params.min_samples_split {
            return leaf;
        }

        let parent = gini(&counts);
        let Some(best) = self.best_split(samples) else {
            return leaf;
        };
        if best.impurity >= parent - 1e-12 {
            return leaf;
        }

        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .iter()
            .copied()
            .partition(|&i| self.x[i][best.feature] <= best.threshold);

        Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(self.build(&left, depth + 1)),
            right: Box::new(self.build(&right, depth + 1)),
        }
    }

    /// Search a random subset of features for the split with the lowest
    /// weighted child impurity. Thresholds sit midway between adjacent
    /// distinct values.
    fn best_split(&mut self, samples: &[usize]) -> Option<BestSplit> {
        let m = self.params.max_features.clamp(1, self.n_features);
        let candidates = rand::seq::index::sample(&mut *self.rng, self.n_features, m);

        let n = samples.len() as f64;
        let mut best: Option<BestSplit> = None;
        let mut order: Vec<usize> = samples.to_vec();

        for feature in candidates.iter() {
            order.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));

            let mut left = [0usize; Tier::COUNT];
            let mut right = class_counts(self.y, &order);
            for k in 0..order.len() - 1 {
                let i = order[k];
                left[self.y[i]] += 1;
                right[self.y[i]] -= 1;

                let here = self.x[i][feature];
                let next = self.x[order[k + 1]][feature];
                if next - here <= f64::EPSILON * here.abs().max(1.0) {
                    continue;
                }

                let n_left = (k + 1) as f64;
                let impurity = (n_left * gini(&left) + (n - n_left) * gini(&right)) / n;
                if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                    best = Some(BestSplit {
                        feature,
                        threshold: here + (next - here) / 2.0,
                        impurity,
                    });
                }
            }
        }
        best
    }
}

impl DecisionTree {
    /// Fit on the rows listed in `samples` (duplicates allowed, as produced
    /// by bootstrap sampling). Labels are tier indices.
    pub fn fit<R: Rng>(
        x: &[Vec<f64>],
        y: &[usize],
        samples: &[usize],
        params: TreeParams,
        rng: &mut R,
    ) -> Self {
        let n_features = x.first().map_or(0, Vec::len);
        let mut builder = Builder {
            x,
            y,
            n_features,
            params,
            rng,
        };
        let root = if n_features == 0 || samples.is_empty() {
            Node::Leaf {
                class: argmax(&class_counts(y, samples)),
            }
        } else {
            builder.build(samples, 0)
        };
        Self { root }
    }

    /// Predicted tier index for one row.
    pub fn predict_index(&self, row: &[f64]) -> usize {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf { class } => return *class,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold {
                        left.as_ref()
                    } else {
                        right.as_ref()
                    };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(node: &Node) -> usize {
            match node {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        walk(&self.root)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn all_features(n: usize) -> TreeParams {
        TreeParams {
            max_depth: None,
            min_samples_split: 2,
            max_features: n,
        }
    }

    #[test]
    fn gini_known_values() {
        assert_eq!(gini(&[4, 0, 0]), 0.0);
        assert!((gini(&[2, 2, 0]) - 0.5).abs() < 1e-12);
        assert!((gini(&[1, 1, 1]) - (2.0 / 3.0)).abs() < 1e-12);
        assert_eq!(gini(&[0, 0, 0]), 0.0);
    }

    #[test]
    fn separable_data_fits_exactly() {
        let x = vec![vec![0.1], vec![0.2], vec![0.5], vec![0.6], vec![0.9], vec![1.0]];
        let y = vec![2, 2, 1, 1, 0, 0];
        let samples: Vec<usize> = (0..x.len()).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let tree = DecisionTree::fit(&x, &y, &samples, all_features(1), &mut rng);
        for (row, &label) in x.iter().zip(&y) {
            assert_eq!(tree.predict_index(row), label);
        }
        assert_eq!(tree.depth(), 2);
        // midpoints generalize
        assert_eq!(tree.predict_index(&[0.0]), 2);
        assert_eq!(tree.predict_index(&[0.55]), 1);
        assert_eq!(tree.predict_index(&[2.0]), 0);
    }

    #[test]
    fn picks_informative_feature() {
        // feature 0 is noise, feature 1 separates the classes
        let x = vec![
            vec![0.3, 0.0],
            vec![0.9, 0.1],
            vec![0.1, 0.9],
            vec![0.7, 1.0],
        ];
        let y = vec![2, 2, 0, 0];
        let samples: Vec<usize> = (0..4).collect();
        let mut rng = StdRng::seed_from_u64(1);
        let tree = DecisionTree::fit(&x, &y, &samples, all_features(2), &mut rng);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict_index(&[0.5, 0.05]), 2);
        assert_eq!(tree.predict_index(&[0.5, 0.95]), 0);
    }

    #[test]
    fn max_depth_limits_growth() {
        let x: Vec<Vec<f64>> = (0..6).map(|i| vec![i as f64]).collect();
        let y = vec![2, 1, 0, 2, 1, 0];
        let samples: Vec<usize> = (0..6).collect();
        let mut rng = StdRng::seed_from_u64(3);
        let params = TreeParams {
            max_depth: Some(1),
            ..all_features(1)
        };
        let tree = DecisionTree::fit(&x, &y, &samples, params, &mut rng);
        assert!(tree.depth() <= 1);
    }

    #[test]
    fn constant_features_give_majority_leaf() {
        let x = vec![vec![1.0], vec![1.0], vec![1.0]];
        let y = vec![1, 1, 2];
        let samples: Vec<usize> = (0..3).collect();
        let mut rng = StdRng::seed_from_u64(0);
        let tree = DecisionTree::fit(&x, &y, &samples, all_features(1), &mut rng);
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.predict_index(&[5.0]), 1);
    }

    #[test]
    fn bootstrap_duplicates_are_weighted() {
        let x = vec![vec![1.0], vec![1.0]];
        let y = vec![0, 2];
        // row 1 drawn three times, row 0 once
        let samples = vec![0, 1, 1, 1];
        let mut rng = StdRng::seed_from_u64(0);
        let tree = DecisionTree::fit(&x, &y, &samples, all_features(1), &mut rng);
        assert_eq!(tree.predict_index(&[1.0]), 2);
    }
}
