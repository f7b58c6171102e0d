// End-to-end runs: score the roster, derive labels, cluster, tune and
// validate the forest, and assemble the serializable reports.

use crate::config::{Config, ConferenceFilter};
use crate::dataset::loader::LoadedRoster;
use crate::dataset::record::{Conference, PlayerSeasonRecord, Tier};
use crate::dataset::RejectedRow;
use crate::metric::cer::MetricKind;
use crate::metric::normalize::Normalization;
use crate::metric::tiering::TierCuts;
use crate::metric::{rank_by, score_candidate, score_cohort, CohortScores, MetricError, ScoredPlayer};
use crate::model::features::{build_features, FeatureMatrix, FeatureSet};
use crate::model::forest::{ForestParams, RandomForest};
use crate::model::kmeans::{self, cluster_tiers, KMeansParams};
use crate::model::{Classifier, ModelError, Trainer};
use crate::validation::grid::{grid_search, ForestGrid, GridScore};
use crate::validation::kfold::{cross_validate, FoldScore};
use crate::validation::loo::leave_one_out;
use crate::validation::metrics::{ClassMetrics, ConfusionMatrix};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Metric(#[from] MetricError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("no scorable players left for conference filter `{0:?}`")]
    EmptyCohort(ConferenceFilter),
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOptions {
    pub metric: MetricKind,
    pub normalization: Normalization,
    pub conference: ConferenceFilter,
    pub features: FeatureSet,
    pub clustering: KMeansParams,
    pub grid: ForestGrid,
    pub folds: usize,
    pub leave_one_out: bool,
    pub validation_seed: u64,
}

impl AnalysisOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            metric: config.metric.primary,
            normalization: config.metric.normalization,
            conference: config.data.conference,
            features: config.forest.features,
            clustering: config.clustering.params(),
            grid: config.forest.grid(),
            folds: config.validation.folds,
            leave_one_out: config.validation.leave_one_out,
            validation_seed: config.validation.seed,
        }
    }
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            metric: MetricKind::Cer,
            normalization: Normalization::MinMax,
            conference: ConferenceFilter::All,
            features: FeatureSet::MetricAndStats,
            clustering: KMeansParams::default(),
            grid: ForestGrid::default(),
            folds: 5,
            leave_one_out: true,
            validation_seed: 7,
        }
    }
}

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// Where training labels came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelSource {
    /// Every record carried a `tier` column value.
    Dataset,
    /// Equal-frequency tiers of the primary metric.
    Quantile,
}

/// One ranked row of the `score` command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreRow {
    pub rank: usize,
    pub name: String,
    pub conference: Option<Conference>,
    pub games_played: u32,
    pub cer: f64,
    pub mvpcem: Option<f64>,
    pub metric_tier: Tier,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreReport {
    pub generated_at: DateTime<Utc>,
    pub metric: MetricKind,
    pub normalization: Normalization,
    pub conference: ConferenceFilter,
    pub players: Vec<ScoreRow>,
    pub rejected: Vec<RejectedRow>,
}

/// Per-player outcome of a full analysis run. Flat so it can be written as
/// one CSV row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerReport {
    pub rank: usize,
    pub name: String,
    pub conference: Option<Conference>,
    pub games_played: u32,
    pub cer: f64,
    pub mvpcem: Option<f64>,
    pub metric_tier: Tier,
    pub label: Tier,
    pub cluster_tier: Tier,
    /// Prediction made while this player was in the held-out fold.
    pub cv_tier: Tier,
    pub loo_tier: Option<Tier>,
    /// Prediction of the forest fitted on the whole cohort.
    pub predicted_tier: Tier,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusteringSummary {
    pub k: usize,
    pub iterations: usize,
    pub converged: bool,
    pub inertia: f64,
    /// Share of players whose cluster tier equals their label.
    pub agreement: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossValidationSummary {
    pub folds: Vec<FoldScore>,
    pub mean_accuracy: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub generated_at: DateTime<Utc>,
    pub metric: MetricKind,
    pub normalization: Normalization,
    pub conference: ConferenceFilter,
    pub features: Vec<String>,
    pub label_source: LabelSource,
    pub players: Vec<PlayerReport>,
    pub rejected: Vec<RejectedRow>,
    pub clustering: ClusteringSummary,
    pub grid: Vec<GridScore<ForestParams>>,
    pub best_params: ForestParams,
    pub cross_validation: CrossValidationSummary,
    pub leave_one_out_accuracy: Option<f64>,
    pub confusion: ConfusionMatrix,
    pub class_metrics: Vec<ClassMetrics>,
}

/// A hypothetical player scored against the cohort and classified by a
/// forest trained on it.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateReport {
    pub generated_at: DateTime<Utc>,
    pub name: String,
    pub cer: f64,
    pub mvpcem: Option<f64>,
    pub metric: MetricKind,
    pub metric_tier: Tier,
    pub predicted_tier: Tier,
    pub confidence: f64,
    pub cohort_size: usize,
    pub best_params: ForestParams,
}

// ---------------------------------------------------------------------------
// Cohort preparation
// ---------------------------------------------------------------------------

/// Players ready for modelling, ranked by the primary metric.
struct Prepared {
    players: Vec<ScoredPlayer>,
    rejected: Vec<RejectedRow>,
    metric_values: Vec<f64>,
    cuts: TierCuts,
}

/// Apply the conference filter and drop players lacking the primary metric.
/// Normalization has already happened over the full roster.
fn prepare(
    scores: CohortScores,
    mut rejected: Vec<RejectedRow>,
    opts: &AnalysisOptions,
) -> Result<Prepared, PipelineError> {
    rejected.extend(scores.rejected);

    let mut players = Vec::new();
    for player in scores.players {
        if !opts.conference.matches(player.record.conference) {
            continue;
        }
        if player.metric(opts.metric).is_none() {
            warn!(
                "excluding '{}': {} needs 3P% and 2P%",
                player.record.name,
                opts.metric.label()
            );
            rejected.push(RejectedRow {
                line: None,
                player: player.record.name.clone(),
                reason: format!("{} needs 3P% and 2P%", opts.metric.label()),
            });
            continue;
        }
        players.push(player);
    }
    if players.is_empty() {
        return Err(PipelineError::EmptyCohort(opts.conference));
    }

    rank_by(&mut players, opts.metric);
    let metric_values: Vec<f64> = players
        .iter()
        .map(|p| p.metric(opts.metric).unwrap_or(f64::NAN))
        .collect();
    let cuts = TierCuts::from_values(&metric_values)?;

    Ok(Prepared {
        players,
        rejected,
        metric_values,
        cuts,
    })
}

/// Dataset labels when every player has one, quantile tiers otherwise.
fn derive_labels(players: &[ScoredPlayer], metric_tiers: &[Tier]) -> (Vec<Tier>, LabelSource) {
    if let Some(labels) = players
        .iter()
        .map(|p| p.record.tier)
        .collect::<Option<Vec<Tier>>>()
    {
        return (labels, LabelSource::Dataset);
    }
    let labelled = players.iter().filter(|p| p.record.tier.is_some()).count();
    if labelled > 0 {
        warn!(
            "only {} of {} players carry a tier label; using quantile tiers instead",
            labelled,
            players.len()
        );
    }
    (metric_tiers.to_vec(), LabelSource::Quantile)
}

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

/// Rank the roster by the primary metric and tier it by quantile.
pub fn score_roster(roster: &LoadedRoster, opts: &AnalysisOptions) -> Result<ScoreReport, PipelineError> {
    let scores = score_cohort(&roster.records, opts.normalization);
    let prepared = prepare(scores, roster.rejected.clone(), opts)?;

    let players = prepared
        .players
        .iter()
        .zip(&prepared.metric_values)
        .enumerate()
        .map(|(i, (p, &value))| ScoreRow {
            rank: i + 1,
            name: p.record.name.clone(),
            conference: p.record.conference,
            games_played: p.record.games_played,
            cer: p.cer,
            mvpcem: p.mvpcem,
            metric_tier: prepared.cuts.tier_of(value),
        })
        .collect();

    Ok(ScoreReport {
        generated_at: Utc::now(),
        metric: opts.metric,
        normalization: opts.normalization,
        conference: opts.conference,
        players,
        rejected: prepared.rejected,
    })
}

/// Full analysis: clustering, grid search, k-fold and leave-one-out
/// validation, and a final forest fitted on the whole cohort.
pub fn run_analysis(roster: &LoadedRoster, opts: &AnalysisOptions) -> Result<AnalysisReport, PipelineError> {
    let scores = score_cohort(&roster.records, opts.normalization);
    let prepared = prepare(scores, roster.rejected.clone(), opts)?;
    let players = &prepared.players;
    info!(
        "analysing {} players ({} rejected) by {}",
        players.len(),
        prepared.rejected.len(),
        opts.metric.label()
    );

    let metric_tiers: Vec<Tier> = prepared
        .metric_values
        .iter()
        .map(|&v| prepared.cuts.tier_of(v))
        .collect();
    let (labels, label_source) = derive_labels(players, &metric_tiers);
    let features = build_features(players, opts.metric, opts.features);

    // Unsupervised discovery
    let clusters = kmeans::fit(&features.rows, &opts.clustering)?;
    let cluster_tier = cluster_tiers(&clusters, FeatureMatrix::METRIC_COLUMN);
    let agreement = agreement(&cluster_tier, &labels);
    info!(
        "k-means: {} iterations, converged={}, agreement with labels {:.3}",
        clusters.iterations, clusters.converged, agreement
    );

    // Supervised classification
    let search = grid_search(
        &opts.grid.candidates(),
        &features.rows,
        &labels,
        opts.folds,
        opts.validation_seed,
    )?;
    let best = search.best;
    let cv = cross_validate(&features.rows, &labels, opts.folds, &best, opts.validation_seed)?;
    info!("best forest ({}) k-fold accuracy {:.3}", best, cv.mean_accuracy);

    let loo = if opts.leave_one_out {
        let loo = leave_one_out(&features.rows, &labels, &best)?;
        info!("leave-one-out accuracy {:.3}", loo.accuracy);
        Some(loo)
    } else {
        None
    };

    let confusion = ConfusionMatrix::from_predictions(&labels, &cv.predictions);
    let forest: RandomForest = best.train(&features.rows, &labels)?;

    let reports = players
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let row = &features.rows[i];
            PlayerReport {
                rank: i + 1,
                name: p.record.name.clone(),
                conference: p.record.conference,
                games_played: p.record.games_played,
                cer: p.cer,
                mvpcem: p.mvpcem,
                metric_tier: metric_tiers[i],
                label: labels[i],
                cluster_tier: cluster_tier[i],
                cv_tier: cv.predictions[i],
                loo_tier: loo.as_ref().map(|l| l.predictions[i]),
                predicted_tier: forest.predict(row),
                confidence: forest.confidence(row),
            }
        })
        .collect();

    Ok(AnalysisReport {
        generated_at: Utc::now(),
        metric: opts.metric,
        normalization: opts.normalization,
        conference: opts.conference,
        features: features.names,
        label_source,
        players: reports,
        rejected: prepared.rejected,
        clustering: ClusteringSummary {
            k: opts.clustering.k,
            iterations: clusters.iterations,
            converged: clusters.converged,
            inertia: clusters.inertia,
            agreement,
        },
        grid: search.evaluated,
        best_params: best,
        cross_validation: CrossValidationSummary {
            folds: cv.folds,
            mean_accuracy: cv.mean_accuracy,
        },
        leave_one_out_accuracy: loo.map(|l| l.accuracy),
        class_metrics: confusion.class_metrics(),
        confusion,
    })
}

/// Score a hypothetical player against the roster and classify it with a
/// forest tuned on the (filtered) cohort. The candidate joins the roster
/// for normalization but never for training.
pub fn evaluate_candidate(
    roster: &LoadedRoster,
    candidate: &PlayerSeasonRecord,
    opts: &AnalysisOptions,
) -> Result<CandidateReport, PipelineError> {
    candidate.validate().map_err(|e| MetricError::InvalidInput {
        field: "candidate",
        message: e.to_string(),
    })?;
    let scored = score_candidate(&roster.records, candidate, opts.normalization)?;
    let candidate_metric = scored
        .metric(opts.metric)
        .ok_or_else(|| MetricError::InvalidInput {
            field: "candidate",
            message: format!("{} needs 3P% and 2P%", opts.metric.label()),
        })?;

    // Same normalization basis as the candidate: roster plus candidate.
    let mut combined = roster.records.clone();
    combined.push(candidate.clone());
    let mut scores = score_cohort(&combined, opts.normalization);
    // The candidate scored above, so it is the last scored player.
    scores.players.pop();

    let prepared = prepare(scores, Vec::new(), opts)?;
    let metric_tiers: Vec<Tier> = prepared
        .metric_values
        .iter()
        .map(|&v| prepared.cuts.tier_of(v))
        .collect();
    let (labels, _) = derive_labels(&prepared.players, &metric_tiers);
    let features = build_features(&prepared.players, opts.metric, opts.features);

    let search = grid_search(
        &opts.grid.candidates(),
        &features.rows,
        &labels,
        opts.folds,
        opts.validation_seed,
    )?;
    let forest = search.best.train(&features.rows, &labels)?;

    let candidate_features = build_features(std::slice::from_ref(&scored), opts.metric, opts.features);
    let row = &candidate_features.rows[0];

    Ok(CandidateReport {
        generated_at: Utc::now(),
        name: candidate.name.clone(),
        cer: scored.cer,
        mvpcem: scored.mvpcem,
        metric: opts.metric,
        metric_tier: prepared.cuts.tier_of(candidate_metric),
        predicted_tier: forest.predict(row),
        confidence: forest.confidence(row),
        cohort_size: prepared.players.len(),
        best_params: search.best,
    })
}

fn agreement(predicted: &[Tier], labels: &[Tier]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let same = predicted.iter().zip(labels).filter(|(a, b)| a == b).count();
    same as f64 / labels.len() as f64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
