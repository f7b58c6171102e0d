// Cohort normalization: min-max or z-score per box-score column.

use crate::dataset::record::{PlayerSeasonRecord, StatKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How raw stats are put on a common scale before weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    #[default]
    MinMax,
    ZScore,
}

// ---------------------------------------------------------------------------
// Column statistics
// ---------------------------------------------------------------------------

/// Summary of one stat column across the cohort.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stdev: f64,
}

/// Threshold below which a range or standard deviation is treated as zero.
const SPREAD_EPSILON: f64 = 1e-9;

/// Column summary for a slice of values.
///
/// Returns all zeros for an empty slice. Uses the population standard
/// deviation (N denominator): the cohort is the full comparison group,
/// not a sample of it.
pub fn compute_column_stats(values: &[f64]) -> ColumnStats {
    if values.is_empty() {
        return ColumnStats {
            min: 0.0,
            max: 0.0,
            mean: 0.0,
            stdev: 0.0,
        };
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    ColumnStats {
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        mean,
        stdev: variance.sqrt(),
    }
}

/// `(value - min) / (max - min)`, or 0.0 when the column has no spread.
pub fn min_max(value: f64, stats: &ColumnStats) -> f64 {
    let range = stats.max - stats.min;
    if range < SPREAD_EPSILON {
        return 0.0;
    }
    (value - stats.min) / range
}

/// `(value - mean) / stdev`, or 0.0 when the column has no spread.
pub fn zscore(value: f64, stats: &ColumnStats) -> f64 {
    if stats.stdev < SPREAD_EPSILON {
        return 0.0;
    }
    (value - stats.mean) / stats.stdev
}

// ---------------------------------------------------------------------------
// Normalized stats
// ---------------------------------------------------------------------------

/// Per-player stats expressed relative to the cohort.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalizedStats {
    pub points: f64,
    pub rebounds: f64,
    pub assists: f64,
    pub steals: f64,
    pub blocks: f64,
    pub turnovers: f64,
    pub fg_pct: f64,
    pub ft_pct: f64,
    pub three_pct: Option<f64>,
    pub two_pct: Option<f64>,
}

impl NormalizedStats {
    /// The eight stats the CER formula uses, in a fixed order.
    pub fn core_values(&self) -> [f64; 8] {
        [
            self.points,
            self.rebounds,
            self.assists,
            self.steals,
            self.blocks,
            self.turnovers,
            self.fg_pct,
            self.ft_pct,
        ]
    }

    pub const CORE_NAMES: [&'static str; 8] = [
        "ppg_n", "rpg_n", "apg_n", "spg_n", "bpg_n", "to_n", "fg%_n", "ft%_n",
    ];
}

// ---------------------------------------------------------------------------
// Cohort
// ---------------------------------------------------------------------------

/// Column statistics over the comparison group. Built once per batch and
/// used to normalize every member (or an outside candidate) against it.
#[derive(Debug, Clone)]
pub struct Cohort {
    method: Normalization,
    columns: HashMap<StatKind, ColumnStats>,
    size: usize,
}

impl Cohort {
    pub fn new(records: &[PlayerSeasonRecord], method: Normalization) -> Self {
        let columns = StatKind::ALL
            .into_iter()
            .map(|stat| {
                let values: Vec<f64> = records.iter().filter_map(|r| stat.value(r)).collect();
                (stat, compute_column_stats(&values))
            })
            .collect();
        Self {
            method,
            columns,
            size: records.len(),
        }
    }

    pub fn method(&self) -> Normalization {
        self.method
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn column(&self, stat: StatKind) -> Option<&ColumnStats> {
        self.columns.get(&stat)
    }

    fn scale(&self, stat: StatKind, value: f64) -> f64 {
        let Some(stats) = self.columns.get(&stat) else {
            return f64::NAN;
        };
        match self.method {
            Normalization::MinMax => min_max(value, stats),
            Normalization::ZScore => zscore(value, stats),
        }
    }

    /// Normalize a record against this cohort. Non-finite raw values stay
    /// non-finite so the metric engine can reject them.
    pub fn normalize(&self, record: &PlayerSeasonRecord) -> NormalizedStats {
        NormalizedStats {
            points: self.scale(StatKind::Points, record.points),
            rebounds: self.scale(StatKind::Rebounds, record.rebounds),
            assists: self.scale(StatKind::Assists, record.assists),
            steals: self.scale(StatKind::Steals, record.steals),
            blocks: self.scale(StatKind::Blocks, record.blocks),
            turnovers: self.scale(StatKind::Turnovers, record.turnovers),
            fg_pct: self.scale(StatKind::FieldGoalPct, record.fg_pct),
            ft_pct: self.scale(StatKind::FreeThrowPct, record.ft_pct),
            three_pct: record
                .three_pct
                .map(|v| self.scale(StatKind::ThreePointPct, v)),
            two_pct: record.two_pct.map(|v| self.scale(StatKind::TwoPointPct, v)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
