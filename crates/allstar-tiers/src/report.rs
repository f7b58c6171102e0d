// Report output: JSON documents, CSV score tables, and plain-text summaries.

use crate::metric::cer::MetricKind;
use crate::metric::ScoredPlayer;
use crate::pipeline::{AnalysisReport, CandidateReport, ScoreReport};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write CSV {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error("failed to serialize {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

fn ensure_parent(path: &Path) -> Result<(), ReportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ReportError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

/// Pretty-printed JSON, creating parent directories as needed.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ReportError> {
    ensure_parent(path)?;
    let text = serde_json::to_string_pretty(value).map_err(|e| ReportError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;
    fs::write(path, text).map_err(|e| ReportError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

/// One CSV row per element, header taken from the field names.
pub fn write_csv_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), ReportError> {
    ensure_parent(path)?;
    let csv_err = |e| ReportError::Csv {
        path: path.to_path_buf(),
        source: e,
    };
    let mut wtr = csv::Writer::from_path(path).map_err(csv_err)?;
    for row in rows {
        wtr.serialize(row).map_err(csv_err)?;
    }
    wtr.flush().map_err(|e| ReportError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

fn opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.3}"))
}

fn pct(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

pub fn render_scores(report: &ScoreReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} ranking ({:?} normalization, conference {:?})",
        report.metric.label(),
        report.normalization,
        report.conference
    );
    let _ = writeln!(
        out,
        "{:>4}  {:<28} {:>5} {:>4} {:>8} {:>8}  {}",
        "rank", "player", "conf", "gp", "CER", "MVPCEM", "tier"
    );
    for p in &report.players {
        let _ = writeln!(
            out,
            "{:>4}  {:<28} {:>5} {:>4} {:>8.3} {:>8}  {}",
            p.rank,
            p.name,
            p.conference.map_or("-", |c| c.as_str()),
            p.games_played,
            p.cer,
            opt(p.mvpcem),
            p.metric_tier
        );
    }
    render_rejected(&mut out, report.rejected.len());
    out
}

pub fn render_summary(report: &AnalysisReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} players, primary metric {}, labels from {:?}",
        report.players.len(),
        report.metric.label(),
        report.label_source
    );
    let c = &report.clustering;
    let _ = writeln!(
        out,
        "k-means (k={}): {} iterations, {}, agreement {}",
        c.k,
        c.iterations,
        if c.converged { "converged" } else { "NOT converged" },
        pct(c.agreement)
    );
    let _ = writeln!(out, "best forest: {}", report.best_params);
    let _ = writeln!(
        out,
        "{}-fold accuracy: {}",
        report.cross_validation.folds.len(),
        pct(report.cross_validation.mean_accuracy)
    );
    if let Some(acc) = report.leave_one_out_accuracy {
        let _ = writeln!(out, "leave-one-out accuracy: {}", pct(acc));
    }
    let _ = writeln!(
        out,
        "{:<10} {:>9} {:>9} {:>9} {:>8}",
        "tier", "precision", "recall", "f1", "support"
    );
    for m in &report.class_metrics {
        let _ = writeln!(
            out,
            "{:<10} {:>9} {:>9} {:>9} {:>8}",
            m.tier.label(),
            opt(m.precision),
            opt(m.recall),
            opt(m.f1),
            m.support
        );
    }
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:>4}  {:<28} {:>8}  {:<9} {:<9} {:<9} {:<9}",
        "rank", "player", "metric", "label", "cluster", "held-out", "forest"
    );
    for p in &report.players {
        let metric = match report.metric {
            MetricKind::Cer => Some(p.cer),
            MetricKind::Mvpcem => p.mvpcem,
        };
        let _ = writeln!(
            out,
            "{:>4}  {:<28} {:>8}  {:<9} {:<9} {:<9} {:<9}",
            p.rank,
            p.name,
            opt(metric),
            p.label.label(),
            p.cluster_tier.label(),
            p.cv_tier.label(),
            p.predicted_tier.label()
        );
    }
    render_rejected(&mut out, report.rejected.len());
    out
}

pub fn render_candidate(report: &CandidateReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", report.name);
    let _ = writeln!(out, "  CER:            {:.3}", report.cer);
    let _ = writeln!(out, "  MVPCEM:         {}", opt(report.mvpcem));
    let _ = writeln!(
        out,
        "  {} tier:  {} (against {} players)",
        report.metric.label(),
        report.metric_tier,
        report.cohort_size
    );
    let _ = writeln!(
        out,
        "  forest tier:    {} ({} of trees)",
        report.predicted_tier,
        pct(report.confidence)
    );
    out
}

/// Scores of one roster member, measured against the rest of the roster.
pub fn render_member(player: &ScoredPlayer, cohort_size: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} (against {} other players)", player.record.name, cohort_size);
    let _ = writeln!(out, "  CER:     {:.3}", player.cer);
    let _ = writeln!(out, "  MVPCEM:  {}", opt(player.mvpcem));
    out
}

fn render_rejected(out: &mut String, count: usize) {
    if count > 0 {
        let _ = writeln!(out, "{count} row(s) excluded; see the report for reasons");
    }
}
