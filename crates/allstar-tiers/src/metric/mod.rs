// Metric engine: cohort normalization, CER/MVPCEM scoring, quantile tiers.

pub mod cer;
pub mod normalize;
pub mod tiering;

use crate::dataset::record::PlayerSeasonRecord;
use crate::dataset::RejectedRow;
use cer::MetricKind;
use normalize::{Cohort, Normalization, NormalizedStats};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricError {
    #[error("invalid input for `{field}`: {message}")]
    InvalidInput {
        field: &'static str,
        message: String,
    },

    #[error("need at least {needed} players, got {got}")]
    TooFewPlayers { needed: usize, got: usize },
}

/// A record with its normalized stats and both efficiency scores.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredPlayer {
    pub record: PlayerSeasonRecord,
    pub normalized: NormalizedStats,
    pub cer: f64,
    /// `None` when the record lacks 3P% or 2P%.
    pub mvpcem: Option<f64>,
}

impl ScoredPlayer {
    pub fn metric(&self, kind: MetricKind) -> Option<f64> {
        match kind {
            MetricKind::Cer => Some(self.cer),
            MetricKind::Mvpcem => self.mvpcem,
        }
    }
}

/// Scores for a cohort plus the rows the metric engine had to reject.
#[derive(Debug, Clone, Default)]
pub struct CohortScores {
    pub players: Vec<ScoredPlayer>,
    pub rejected: Vec<RejectedRow>,
}

fn score_one(cohort: &Cohort, record: &PlayerSeasonRecord) -> Result<ScoredPlayer, MetricError> {
    let normalized = cohort.normalize(record);
    let cer = cer::cer(&normalized, record.games_played)?;
    let mvpcem = match (normalized.three_pct, normalized.two_pct) {
        (Some(_), Some(_)) => Some(cer::mvpcem(&normalized, record.games_played)?),
        _ => None,
    };
    Ok(ScoredPlayer {
        record: record.clone(),
        normalized,
        cer,
        mvpcem,
    })
}

/// Normalize every record against the whole slice and score it. A record
/// that cannot be scored is rejected without stopping the batch.
pub fn score_cohort(records: &[PlayerSeasonRecord], method: Normalization) -> CohortScores {
    let cohort = Cohort::new(records, method);
    let mut scores = CohortScores::default();
    for record in records {
        match score_one(&cohort, record) {
            Ok(player) => scores.players.push(player),
            Err(e) => {
                warn!("excluding '{}' from scoring: {}", record.name, e);
                scores.rejected.push(RejectedRow {
                    line: None,
                    player: record.name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
    debug!(
        "scored {} players ({} rejected) with {:?} normalization",
        scores.players.len(),
        scores.rejected.len(),
        method
    );
    scores
}

/// Score a hypothetical player against an existing cohort. The candidate
/// joins the cohort for normalization, so column ranges can stretch to
/// include it.
pub fn score_candidate(
    cohort: &[PlayerSeasonRecord],
    candidate: &PlayerSeasonRecord,
    method: Normalization,
) -> Result<ScoredPlayer, MetricError> {
    let mut combined = cohort.to_vec();
    combined.push(candidate.clone());
    let stats = Cohort::new(&combined, method);
    score_one(&stats, candidate)
}

/// Score one roster member against the rest of the roster, as shown after
/// adding or editing a player. `None` when no record carries `name`.
pub fn score_member(
    records: &[PlayerSeasonRecord],
    name: &str,
    method: Normalization,
) -> Option<Result<ScoredPlayer, MetricError>> {
    let index = records.iter().position(|r| r.name == name)?;
    let mut rest = records.to_vec();
    let member = rest.remove(index);
    Some(score_candidate(&rest, &member, method))
}

/// Sort descending by the chosen metric; players without it sink to the end.
pub fn rank_by(players: &mut [ScoredPlayer], kind: MetricKind) {
    players.sort_by(|a, b| {
        let a = a.metric(kind).unwrap_or(f64::NEG_INFINITY);
        let b = b.metric(kind).unwrap_or(f64::NEG_INFINITY);
        b.total_cmp(&a)
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::record::tests::sample_record;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn three_players() -> Vec<PlayerSeasonRecord> {
        let mut star = sample_record("Star");
        star.points = 32.0;
        star.rebounds = 11.0;
        star.assists = 9.0;
        star.turnovers = 3.0;
        let mut solid = sample_record("Solid");
        solid.points = 24.0;
        solid.rebounds = 6.0;
        solid.assists = 5.0;
        solid.turnovers = 2.5;
        let mut role = sample_record("Role");
        role.points = 18.0;
        role.rebounds = 4.0;
        role.assists = 3.0;
        role.turnovers = 2.0;
        vec![star, solid, role]
    }

    #[test]
    fn cohort_scores_order_by_production() {
        let scores = score_cohort(&three_players(), Normalization::MinMax);
        assert_eq!(scores.players.len(), 3);
        assert!(scores.rejected.is_empty());
        assert!(scores.players[0].cer > scores.players[1].cer);
        assert!(scores.players[1].cer > scores.players[2].cer);
    }

    #[test]
    fn cohort_scores_match_formula() {
        let records = three_players();
        let scores = score_cohort(&records, Normalization::MinMax);
        let star = &scores.players[0];
        // Star tops every varying column: ppg/rpg/apg/to normalize to 1.0,
        // constant columns normalize to 0.0.
        let raw = 0.35 + 0.20 + 0.20 - 0.10;
        assert!(approx_eq(star.cer, raw * 70f64.ln(), 1e-12));
    }

    #[test]
    fn member_scores_like_the_full_cohort() {
        let records = three_players();
        let cohort = score_cohort(&records, Normalization::MinMax);
        let solid = score_member(&records, "Solid", Normalization::MinMax)
            .unwrap()
            .unwrap();
        assert_eq!(solid.record.name, "Solid");
        assert!(approx_eq(solid.cer, cohort.players[1].cer, 1e-12));
        assert_eq!(solid.mvpcem.is_some(), cohort.players[1].mvpcem.is_some());
        assert!(score_member(&records, "Nobody", Normalization::MinMax).is_none());
    }

    #[test]
    fn mvpcem_absent_without_split_shooting() {
        let mut records = three_players();
        records[2].two_pct = None;
        let scores = score_cohort(&records, Normalization::MinMax);
        assert!(scores.players[0].mvpcem.is_some());
        assert!(scores.players[2].mvpcem.is_none());
        assert_eq!(scores.players[2].metric(MetricKind::Mvpcem), None);
    }

    #[test]
    fn unscorable_record_is_rejected_not_fatal() {
        let mut records = three_players();
        records[1].games_played = 0;
        let scores = score_cohort(&records, Normalization::MinMax);
        assert_eq!(scores.players.len(), 2);
        assert_eq!(scores.rejected.len(), 1);
        assert_eq!(scores.rejected[0].player, "Solid");
    }

    #[test]
    fn candidate_normalized_with_cohort() {
        let records = three_players();
        let mut candidate = sample_record("Rookie");
        candidate.points = 40.0;
        let scored = score_candidate(&records, &candidate, Normalization::MinMax).unwrap();
        assert!(approx_eq(scored.normalized.points, 1.0, 1e-12));
        assert_eq!(scored.record.name, "Rookie");
    }

    #[test]
    fn candidate_with_zero_games_errors() {
        let mut candidate = sample_record("Injured");
        candidate.games_played = 0;
        let err = score_candidate(&three_players(), &candidate, Normalization::MinMax);
        assert!(err.is_err());
    }

    #[test]
    fn rank_by_sorts_descending() {
        let mut players = score_cohort(&three_players(), Normalization::MinMax).players;
        players.reverse();
        rank_by(&mut players, MetricKind::Cer);
        assert_eq!(players[0].record.name, "Star");
        assert_eq!(players[2].record.name, "Role");
    }
}
