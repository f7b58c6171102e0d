// Customized Efficiency Rating (CER / Final CEM) and the MVPCEM variant.
//
//   raw    = 0.35*PTS + 0.20*REB + 0.20*AST + 0.10*FG%
//            + 0.05*(STL + BLK + FT%) - 0.10*TOV
//   CER    = raw * ln(games_played)
//
// MVPCEM swaps the shooting block for one that also credits 3P% and 2P%.
// Both expect cohort-normalized inputs.

use crate::metric::normalize::NormalizedStats;
use crate::metric::MetricError;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Weights
// ---------------------------------------------------------------------------

pub const W_POINTS: f64 = 0.35;
pub const W_REBOUNDS: f64 = 0.20;
pub const W_ASSISTS: f64 = 0.20;
pub const W_FG_PCT: f64 = 0.10;
/// Shared by steals, blocks, and free-throw percentage.
pub const W_DEFENSE_FT: f64 = 0.05;
pub const W_TURNOVERS: f64 = 0.10;

pub const W_MVP_THREE_PCT: f64 = 0.07;
pub const W_MVP_TWO_PCT: f64 = 0.05;

/// Which efficiency metric drives features and labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    #[default]
    Cer,
    #[serde(alias = "mvp_cem")]
    Mvpcem,
}

impl MetricKind {
    pub fn label(self) -> &'static str {
        match self {
            MetricKind::Cer => "CER",
            MetricKind::Mvpcem => "MVPCEM",
        }
    }

    pub fn score(self, stats: &NormalizedStats, games_played: u32) -> Result<f64, MetricError> {
        match self {
            MetricKind::Cer => cer(stats, games_played),
            MetricKind::Mvpcem => mvpcem(stats, games_played),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn require_finite(field: &'static str, value: f64) -> Result<f64, MetricError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(MetricError::InvalidInput {
            field,
            message: format!("normalized value is {value}"),
        })
    }
}

fn require_present(field: &'static str, value: Option<f64>) -> Result<f64, MetricError> {
    match value {
        Some(v) => require_finite(field, v),
        None => Err(MetricError::InvalidInput {
            field,
            message: "value is missing".into(),
        }),
    }
}

/// `ln(games_played)`. Zero games has no defined adjustment.
pub fn games_adjustment(games_played: u32) -> Result<f64, MetricError> {
    if games_played == 0 {
        return Err(MetricError::InvalidInput {
            field: "games_played",
            message: "must be at least 1".into(),
        });
    }
    Ok(f64::from(games_played).ln())
}

// ---------------------------------------------------------------------------
// CER
// ---------------------------------------------------------------------------

/// Weighted sum before the games-played adjustment.
pub fn raw_cer(stats: &NormalizedStats) -> Result<f64, MetricError> {
    let pts = require_finite("ppg", stats.points)?;
    let reb = require_finite("rpg", stats.rebounds)?;
    let ast = require_finite("apg", stats.assists)?;
    let fg = require_finite("fg%", stats.fg_pct)?;
    let stl = require_finite("spg", stats.steals)?;
    let blk = require_finite("bpg", stats.blocks)?;
    let ft = require_finite("ft%", stats.ft_pct)?;
    let tov = require_finite("to", stats.turnovers)?;

    Ok(W_POINTS * pts + W_REBOUNDS * reb + W_ASSISTS * ast + W_FG_PCT * fg
        + W_DEFENSE_FT * (stl + blk + ft)
        - W_TURNOVERS * tov)
}

pub fn cer(stats: &NormalizedStats, games_played: u32) -> Result<f64, MetricError> {
    let adjustment = games_adjustment(games_played)?;
    Ok(raw_cer(stats)? * adjustment)
}

// ---------------------------------------------------------------------------
// MVPCEM
// ---------------------------------------------------------------------------

pub fn raw_mvpcem(stats: &NormalizedStats) -> Result<f64, MetricError> {
    let pts = require_finite("ppg", stats.points)?;
    let reb = require_finite("rpg", stats.rebounds)?;
    let ast = require_finite("apg", stats.assists)?;
    let stl = require_finite("spg", stats.steals)?;
    let blk = require_finite("bpg", stats.blocks)?;
    let fg = require_finite("fg%", stats.fg_pct)?;
    let three = require_present("3p%", stats.three_pct)?;
    let two = require_present("2p%", stats.two_pct)?;
    let ft = require_finite("ft%", stats.ft_pct)?;
    let tov = require_finite("to", stats.turnovers)?;

    Ok(W_POINTS * pts
        + W_REBOUNDS * reb
        + W_ASSISTS * ast
        + W_DEFENSE_FT * stl
        + W_DEFENSE_FT * blk
        + W_FG_PCT * fg
        + W_MVP_THREE_PCT * three
        + W_MVP_TWO_PCT * two
        + W_DEFENSE_FT * ft
        - W_TURNOVERS * tov)
}

pub fn mvpcem(stats: &NormalizedStats, games_played: u32) -> Result<f64, MetricError> {
    let adjustment = games_adjustment(games_played)?;
    Ok(raw_mvpcem(stats)? * adjustment)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
