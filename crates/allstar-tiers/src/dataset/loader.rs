// Roster CSV loading.
//
// Reads the All-Star dataset format: one row per player-season with
// `player_name, conference, games_played, mp, ppg, rpg, apg, spg, bpg, to,
// fg%, 3p%, 2p%, ft%, salary, tier`. Invalid rows are rejected individually
// and reported back; they never abort the load.

use crate::dataset::record::{
    validate_games_played, Conference, PlayerSeasonRecord, StatKind, Tier,
};
use crate::dataset::{DatasetError, RejectedRow};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// Valid records plus everything that was rejected along the way.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadedRoster {
    pub records: Vec<PlayerSeasonRecord>,
    pub rejected: Vec<RejectedRow>,
}

// ---------------------------------------------------------------------------
// Raw CSV serde struct (private)
// ---------------------------------------------------------------------------

/// Headers accepted for the player name, matching the serde aliases below.
const NAME_HEADERS: [&str; 3] = ["player_name", "Player", "name"];

/// Extra columns are ignored. Optional columns may be absent or blank.
#[derive(Debug, Deserialize)]
struct RawRosterRow {
    #[serde(alias = "Player", alias = "name")]
    player_name: String,
    #[serde(default)]
    conference: Option<String>,
    #[serde(alias = "gp", alias = "G")]
    games_played: f64,
    #[serde(default)]
    mp: Option<f64>,
    ppg: f64,
    rpg: f64,
    apg: f64,
    spg: f64,
    bpg: f64,
    #[serde(alias = "tov")]
    to: f64,
    #[serde(rename = "fg%")]
    fg_pct: f64,
    #[serde(rename = "3p%", default)]
    three_pct: Option<f64>,
    #[serde(rename = "2p%", default)]
    two_pct: Option<f64>,
    #[serde(rename = "ft%")]
    ft_pct: f64,
    #[serde(default)]
    salary: Option<f64>,
    #[serde(default)]
    tier: Option<String>,
}

impl RawRosterRow {
    fn into_record(self) -> Result<PlayerSeasonRecord, String> {
        let name = self.player_name.trim().to_string();
        let games_played = validate_games_played(self.games_played).map_err(|e| e.to_string())?;

        let conference = match self.conference.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<Conference>()?),
        };
        let tier = match self.tier.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<Tier>()?),
        };
        let salary = match self.salary {
            None => None,
            Some(s) if s.is_finite() && s >= 0.0 => Some(s.round() as u64),
            Some(s) => return Err(format!("salary must be a non-negative number, got {s}")),
        };

        let record = PlayerSeasonRecord {
            name,
            conference,
            games_played,
            minutes_per_game: self.mp,
            points: self.ppg,
            rebounds: self.rpg,
            assists: self.apg,
            steals: self.spg,
            blocks: self.bpg,
            turnovers: self.to,
            fg_pct: self.fg_pct,
            ft_pct: self.ft_pct,
            three_pct: self.three_pct,
            two_pct: self.two_pct,
            salary,
            tier,
        };
        record.validate().map_err(|e| e.to_string())?;
        Ok(record)
    }
}

/// Parse and validate one CSV row against its header record.
pub(crate) fn parse_row(
    headers: &csv::StringRecord,
    row: &csv::StringRecord,
) -> Result<PlayerSeasonRecord, String> {
    row.deserialize::<RawRosterRow>(Some(headers))
        .map_err(|e| e.to_string())
        .and_then(RawRosterRow::into_record)
}

// ---------------------------------------------------------------------------
// Percentage scale
// ---------------------------------------------------------------------------

/// Rescale any percentage column recorded on the 0-100 scale to fractions.
/// A column is treated as 0-100 when its maximum exceeds 1.0.
pub fn rescale_percentages(records: &mut [PlayerSeasonRecord]) {
    for stat in StatKind::ALL.into_iter().filter(|s| s.is_percentage()) {
        let max = records
            .iter()
            .filter_map(|r| stat.value(r))
            .fold(f64::NEG_INFINITY, f64::max);
        if max > 1.0 {
            debug!("rescaling column {} from 0-100 to fractions", stat.column());
            for record in records.iter_mut() {
                if let Some(v) = stat.value_mut(record) {
                    *v /= 100.0;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Reader-based loader (enables testing without temp files)
// ---------------------------------------------------------------------------

pub fn load_roster_from_reader<R: Read>(rdr: R) -> Result<LoadedRoster, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(rdr);
    let headers = reader.headers()?.clone();
    let name_column = headers.iter().position(|h| NAME_HEADERS.contains(&h));

    let mut roster = LoadedRoster::default();
    for result in reader.records() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                let line = e.position().map(|p| p.line());
                warn!("skipping unreadable roster row: {}", e);
                roster.rejected.push(RejectedRow {
                    line,
                    player: String::new(),
                    reason: e.to_string(),
                });
                continue;
            }
        };
        let line = row.position().map(|p| p.line());
        let player = name_column
            .and_then(|i| row.get(i))
            .unwrap_or_default()
            .to_string();

        match parse_row(&headers, &row) {
            Ok(record) => roster.records.push(record),
            Err(reason) => {
                warn!("skipping player '{}': {}", player, reason);
                roster.rejected.push(RejectedRow {
                    line,
                    player,
                    reason,
                });
            }
        }
    }

    rescale_percentages(&mut roster.records);
    Ok(roster)
}

// ---------------------------------------------------------------------------
// Public path-based loader
// ---------------------------------------------------------------------------

/// Load a roster CSV. Fails if the file cannot be read or yields no valid rows.
pub fn load_roster(path: &Path) -> Result<LoadedRoster, DatasetError> {
    let file = std::fs::File::open(path).map_err(|e| DatasetError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let roster = load_roster_from_reader(file).map_err(|e| DatasetError::Csv {
        path: path.display().to_string(),
        source: e,
    })?;
    if roster.records.is_empty() {
        return Err(DatasetError::Empty {
            path: path.display().to_string(),
            rejected: roster.rejected.len(),
        });
    }
    Ok(roster)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
