// Feature matrices built from scored players.

use crate::metric::cer::MetricKind;
use crate::metric::normalize::NormalizedStats;
use crate::metric::ScoredPlayer;
use serde::{Deserialize, Serialize};

/// Which columns feed the models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSet {
    /// The efficiency metric alone.
    MetricOnly,
    /// The metric followed by the eight normalized box-score stats.
    #[default]
    MetricAndStats,
}

/// Row-major feature matrix. Column 0 is always the efficiency metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureMatrix {
    pub names: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    /// Column index of the efficiency metric.
    pub const METRIC_COLUMN: usize = 0;

    pub fn width(&self) -> usize {
        self.names.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Build features for each player. A player missing the chosen metric gets
/// NaN in column 0, which the models reject as a missing value.
pub fn build_features(players: &[ScoredPlayer], metric: MetricKind, set: FeatureSet) -> FeatureMatrix {
    let mut names = vec![metric.label().to_string()];
    if set == FeatureSet::MetricAndStats {
        names.extend(NormalizedStats::CORE_NAMES.iter().map(|n| n.to_string()));
    }

    let rows = players
        .iter()
        .map(|p| {
            let mut row = Vec::with_capacity(names.len());
            row.push(p.metric(metric).unwrap_or(f64::NAN));
            if set == FeatureSet::MetricAndStats {
                row.extend(p.normalized.core_values());
            }
            row
        })
        .collect();

    FeatureMatrix { names, rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::record::tests::sample_record;
    use crate::metric::normalize::Normalization;
    use crate::metric::score_cohort;

    fn players() -> Vec<ScoredPlayer> {
        let mut a = sample_record("A");
        a.points = 30.0;
        let mut b = sample_record("B");
        b.points = 20.0;
        b.three_pct = None;
        score_cohort(&[a, b], Normalization::MinMax).players
    }

    #[test]
    fn metric_only_has_one_column() {
        let m = build_features(&players(), MetricKind::Cer, FeatureSet::MetricOnly);
        assert_eq!(m.width(), 1);
        assert_eq!(m.names, vec!["CER".to_string()]);
        assert_eq!(m.len(), 2);
        assert_eq!(m.rows[0].len(), 1);
    }

    #[test]
    fn metric_and_stats_has_nine_columns() {
        let p = players();
        let m = build_features(&p, MetricKind::Cer, FeatureSet::MetricAndStats);
        assert_eq!(m.width(), 9);
        assert_eq!(m.rows[0][FeatureMatrix::METRIC_COLUMN], p[0].cer);
        assert_eq!(m.rows[0][1], 1.0); // ppg_n for the top scorer
        assert_eq!(m.rows[1][1], 0.0);
    }

    #[test]
    fn missing_metric_becomes_nan() {
        let m = build_features(&players(), MetricKind::Mvpcem, FeatureSet::MetricOnly);
        assert!(m.rows[0][0].is_finite());
        assert!(m.rows[1][0].is_nan());
    }
}
