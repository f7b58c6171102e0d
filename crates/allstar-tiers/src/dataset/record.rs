// Player-season records, tiers, and row-level validation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Tier
// ---------------------------------------------------------------------------

/// Ordinal classification target. Declaration order is tier order: MVP is
/// index 0, All-Star is the last index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "MVP")]
    Mvp,
    #[serde(rename = "All-NBA")]
    AllNba,
    #[serde(rename = "All-Star")]
    AllStar,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Mvp, Tier::AllNba, Tier::AllStar];
    pub const COUNT: usize = 3;

    pub fn index(self) -> usize {
        match self {
            Tier::Mvp => 0,
            Tier::AllNba => 1,
            Tier::AllStar => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Tier> {
        Tier::ALL.get(index).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            Tier::Mvp => "MVP",
            Tier::AllNba => "All-NBA",
            Tier::AllStar => "All-Star",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Tier {
    type Err = String;

    /// Accepts "MVP", "All-NBA", "All-Star" and the dashboard spellings
    /// ("MVP Caliber", "All-NBA Caliber", ...), ignoring case and separators.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .to_lowercase()
            .trim_end_matches("caliber")
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match key.as_str() {
            "mvp" => Ok(Tier::Mvp),
            "allnba" => Ok(Tier::AllNba),
            "allstar" => Ok(Tier::AllStar),
            _ => Err(format!("unknown tier '{}'", s.trim())),
        }
    }
}

// ---------------------------------------------------------------------------
// Conference
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Conference {
    East,
    West,
}

impl Conference {
    pub fn as_str(self) -> &'static str {
        match self {
            Conference::East => "EAST",
            Conference::West => "WEST",
        }
    }
}

impl fmt::Display for Conference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Conference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "EAST" | "E" | "EASTERN" => Ok(Conference::East),
            "WEST" | "W" | "WESTERN" => Ok(Conference::West),
            other => Err(format!("unknown conference '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// PlayerSeasonRecord
// ---------------------------------------------------------------------------

/// One row per player-season. Per-game stats are raw (not normalized);
/// percentages are fractions in [0, 1] once the loader has rescaled them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerSeasonRecord {
    pub name: String,
    pub conference: Option<Conference>,
    pub games_played: u32,
    pub minutes_per_game: Option<f64>,
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
    pub salary: Option<u64>,
    pub tier: Option<Tier>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("games played must be at least 1, got {0}")]
    NonPositiveGames(f64),

    #[error("games played must be a whole number, got {0}")]
    FractionalGames(f64),

    #[error("field `{field}` is not a finite number")]
    NonFinite { field: &'static str },

    #[error("field `{field}` must not be negative, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("percentage `{field}` must lie in [0, 100], got {value}")]
    PercentOutOfRange { field: &'static str, value: f64 },

    #[error("player name is empty")]
    MissingName,
}

/// Check a raw games-played value before it is narrowed to `u32`.
pub fn validate_games_played(games: f64) -> Result<u32, RecordError> {
    if !games.is_finite() {
        return Err(RecordError::NonFinite {
            field: "games_played",
        });
    }
    if games < 1.0 {
        return Err(RecordError::NonPositiveGames(games));
    }
    if games.fract().abs() > 1e-9 {
        return Err(RecordError::FractionalGames(games));
    }
    Ok(games as u32)
}

fn check_count(field: &'static str, value: f64) -> Result<(), RecordError> {
    if !value.is_finite() {
        return Err(RecordError::NonFinite { field });
    }
    if value < 0.0 {
        return Err(RecordError::Negative { field, value });
    }
    Ok(())
}

fn check_percent(field: &'static str, value: f64) -> Result<(), RecordError> {
    if !value.is_finite() {
        return Err(RecordError::NonFinite { field });
    }
    if !(0.0..=100.0).contains(&value) {
        return Err(RecordError::PercentOutOfRange { field, value });
    }
    Ok(())
}

impl PlayerSeasonRecord {
    /// Row-level validation. Percentages may be on either the fraction or
    /// the 0-100 scale here; column-level rescaling happens in the loader.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.name.trim().is_empty() {
            return Err(RecordError::MissingName);
        }
        if self.games_played == 0 {
            return Err(RecordError::NonPositiveGames(0.0));
        }
        let counts: [(&'static str, f64); 6] = [
            ("ppg", self.points),
            ("rpg", self.rebounds),
            ("apg", self.assists),
            ("spg", self.steals),
            ("bpg", self.blocks),
            ("to", self.turnovers),
        ];
        for (field, value) in counts {
            check_count(field, value)?;
        }
        if let Some(mp) = self.minutes_per_game {
            check_count("mp", mp)?;
        }
        check_percent("fg%", self.fg_pct)?;
        check_percent("ft%", self.ft_pct)?;
        if let Some(v) = self.three_pct {
            check_percent("3p%", v)?;
        }
        if let Some(v) = self.two_pct {
            check_percent("2p%", v)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Stat columns
// ---------------------------------------------------------------------------

/// The box-score columns that take part in cohort normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatKind {
    Points,
    Rebounds,
    Assists,
    Steals,
    Blocks,
    Turnovers,
    FieldGoalPct,
    FreeThrowPct,
    ThreePointPct,
    TwoPointPct,
}

impl StatKind {
    pub const ALL: [StatKind; 10] = [
        StatKind::Points,
        StatKind::Rebounds,
        StatKind::Assists,
        StatKind::Steals,
        StatKind::Blocks,
        StatKind::Turnovers,
        StatKind::FieldGoalPct,
        StatKind::FreeThrowPct,
        StatKind::ThreePointPct,
        StatKind::TwoPointPct,
    ];

    /// CSV column name.
    pub fn column(self) -> &'static str {
        match self {
            StatKind::Points => "ppg",
            StatKind::Rebounds => "rpg",
            StatKind::Assists => "apg",
            StatKind::Steals => "spg",
            StatKind::Blocks => "bpg",
            StatKind::Turnovers => "to",
            StatKind::FieldGoalPct => "fg%",
            StatKind::FreeThrowPct => "ft%",
            StatKind::ThreePointPct => "3p%",
            StatKind::TwoPointPct => "2p%",
        }
    }

    pub fn is_percentage(self) -> bool {
        matches!(
            self,
            StatKind::FieldGoalPct
                | StatKind::FreeThrowPct
                | StatKind::ThreePointPct
                | StatKind::TwoPointPct
        )
    }

    pub fn value(self, record: &PlayerSeasonRecord) -> Option<f64> {
        match self {
            StatKind::Points => Some(record.points),
            StatKind::Rebounds => Some(record.rebounds),
            StatKind::Assists => Some(record.assists),
            StatKind::Steals => Some(record.steals),
            StatKind::Blocks => Some(record.blocks),
            StatKind::Turnovers => Some(record.turnovers),
            StatKind::FieldGoalPct => Some(record.fg_pct),
            StatKind::FreeThrowPct => Some(record.ft_pct),
            StatKind::ThreePointPct => record.three_pct,
            StatKind::TwoPointPct => record.two_pct,
        }
    }

    pub(crate) fn value_mut(self, record: &mut PlayerSeasonRecord) -> Option<&mut f64> {
        match self {
            StatKind::Points => Some(&mut record.points),
            StatKind::Rebounds => Some(&mut record.rebounds),
            StatKind::Assists => Some(&mut record.assists),
            StatKind::Steals => Some(&mut record.steals),
            StatKind::Blocks => Some(&mut record.blocks),
            StatKind::Turnovers => Some(&mut record.turnovers),
            StatKind::FieldGoalPct => Some(&mut record.fg_pct),
            StatKind::FreeThrowPct => Some(&mut record.ft_pct),
            StatKind::ThreePointPct => record.three_pct.as_mut(),
            StatKind::TwoPointPct => record.two_pct.as_mut(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
