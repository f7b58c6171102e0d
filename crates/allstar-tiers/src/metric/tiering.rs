// Equal-frequency tiering: split a metric into thirds by quantile.

use crate::dataset::record::Tier;
use crate::metric::MetricError;

/// Linear-interpolation quantile of an ascending slice (the "linear" method:
/// position `q * (n - 1)`).
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let frac = pos - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

/// The two cut points separating All-Star | All-NBA | MVP.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierCuts {
    pub lower: f64,
    pub upper: f64,
}

impl TierCuts {
    pub fn from_values(values: &[f64]) -> Result<Self, MetricError> {
        if values.len() < Tier::COUNT {
            return Err(MetricError::TooFewPlayers {
                needed: Tier::COUNT,
                got: values.len(),
            });
        }
        if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(MetricError::InvalidInput {
                field: "metric",
                message: format!("cannot tier a non-finite score ({bad})"),
            });
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        Ok(Self {
            lower: quantile(&sorted, 1.0 / 3.0),
            upper: quantile(&sorted, 2.0 / 3.0),
        })
    }

    /// Bins are right-closed: a score equal to a cut falls in the lower tier.
    pub fn tier_of(&self, value: f64) -> Tier {
        if value <= self.lower {
            Tier::AllStar
        } else if value <= self.upper {
            Tier::AllNba
        } else {
            Tier::Mvp
        }
    }
}

/// Tier every value by its position in the cohort's distribution.
pub fn quantile_tiers(values: &[f64]) -> Result<Vec<Tier>, MetricError> {
    let cuts = TierCuts::from_values(values)?;
    Ok(values.iter().map(|&v| cuts.tier_of(v)).collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
