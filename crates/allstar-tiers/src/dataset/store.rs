// Roster file editing: add, update, and remove player rows in place.
//
// Rows are handled as raw CSV records so columns this crate does not model
// survive a rewrite untouched.

use crate::dataset::loader::parse_row;
use crate::dataset::record::{Conference, PlayerSeasonRecord, Tier};
use crate::dataset::{DatasetError, COLUMNS, REQUIRED_COLUMNS};
use csv::StringRecord;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Field-by-field changes for an existing player row. `None` leaves the
/// stored value unchanged.
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    pub name: Option<String>,
    pub conference: Option<Conference>,
    pub games_played: Option<u32>,
    pub minutes_per_game: Option<f64>,
    pub points: Option<f64>,
    pub rebounds: Option<f64>,
    pub assists: Option<f64>,
    pub steals: Option<f64>,
    pub blocks: Option<f64>,
    pub turnovers: Option<f64>,
    pub fg_pct: Option<f64>,
    pub three_pct: Option<f64>,
    pub two_pct: Option<f64>,
    pub ft_pct: Option<f64>,
    pub salary: Option<u64>,
    pub tier: Option<Tier>,
}

impl RecordPatch {
    /// The (column, value) pairs this patch sets.
    fn fields(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        if let Some(v) = &self.name {
            out.push(("player_name", v.trim().to_string()));
        }
        if let Some(v) = self.conference {
            out.push(("conference", v.to_string()));
        }
        if let Some(v) = self.games_played {
            out.push(("games_played", v.to_string()));
        }
        let floats: [(&'static str, Option<f64>); 11] = [
            ("mp", self.minutes_per_game),
            ("ppg", self.points),
            ("rpg", self.rebounds),
            ("apg", self.assists),
            ("spg", self.steals),
            ("bpg", self.blocks),
            ("to", self.turnovers),
            ("fg%", self.fg_pct),
            ("3p%", self.three_pct),
            ("2p%", self.two_pct),
            ("ft%", self.ft_pct),
        ];
        for (column, value) in floats {
            if let Some(v) = value {
                out.push((column, v.to_string()));
            }
        }
        if let Some(v) = self.salary {
            out.push(("salary", v.to_string()));
        }
        if let Some(v) = self.tier {
            out.push(("tier", v.to_string()));
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }
}

/// CSV column values for a full record.
fn record_fields(record: &PlayerSeasonRecord) -> Vec<(&'static str, String)> {
    fn opt<T: ToString>(v: Option<T>) -> String {
        v.map(|x| x.to_string()).unwrap_or_default()
    }
    vec![
        ("player_name", record.name.trim().to_string()),
        ("conference", opt(record.conference)),
        ("games_played", record.games_played.to_string()),
        ("mp", opt(record.minutes_per_game)),
        ("ppg", record.points.to_string()),
        ("rpg", record.rebounds.to_string()),
        ("apg", record.assists.to_string()),
        ("spg", record.steals.to_string()),
        ("bpg", record.blocks.to_string()),
        ("to", record.turnovers.to_string()),
        ("fg%", record.fg_pct.to_string()),
        ("3p%", opt(record.three_pct)),
        ("2p%", opt(record.two_pct)),
        ("ft%", record.ft_pct.to_string()),
        ("salary", opt(record.salary)),
        ("tier", opt(record.tier)),
    ]
}

const PERCENT_COLUMNS: [&str; 4] = ["fg%", "3p%", "2p%", "ft%"];

/// Bring a percentage onto the column's scale. Columns without any stored
/// value are kept as fractions, the loader's canonical form. Values outside
/// [0, 100] are left for row validation to reject.
fn conform_percent(value: f64, hundreds: bool) -> f64 {
    if !(0.0..=100.0).contains(&value) {
        return value;
    }
    let scaled = if hundreds && value <= 1.0 {
        value * 100.0
    } else if !hundreds && value > 1.0 {
        value / 100.0
    } else {
        value
    };
    // drop float noise such as 58.300000000000004
    (scaled * 1e9).round() / 1e9
}

/// A roster CSV file on disk.
#[derive(Debug, Clone)]
pub struct RosterStore {
    path: PathBuf,
}

struct Table {
    headers: StringRecord,
    rows: Vec<StringRecord>,
}

impl Table {
    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn name_of(&self, row: &StringRecord) -> Option<String> {
        self.column("player_name")
            .and_then(|i| row.get(i))
            .map(|s| s.trim().to_string())
    }

    /// Whether a percentage column is stored on the 0-100 scale, judged
    /// from every row except `skip`.
    fn column_in_hundreds(&self, index: usize, skip: Option<usize>) -> bool {
        self.rows
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != skip)
            .filter_map(|(_, row)| row.get(index))
            .filter_map(|v| v.trim().parse::<f64>().ok())
            .any(|v| v > 1.0)
    }

    /// Rewrite the given percentage columns of `values` to match the scale
    /// already used by the rest of the file.
    fn conform_percentages(&self, values: &mut [String], columns: &[&str], skip: Option<usize>) {
        for column in columns.iter().filter(|c| PERCENT_COLUMNS.contains(*c)) {
            let Some(i) = self.column(column) else {
                continue;
            };
            let Ok(value) = values[i].trim().parse::<f64>() else {
                continue;
            };
            let conformed = conform_percent(value, self.column_in_hundreds(i, skip));
            if conformed != value {
                debug!("{} {} stored as {} to match the roster's scale", column, value, conformed);
            }
            values[i] = conformed.to_string();
        }
    }
}

impl RosterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> DatasetError {
        DatasetError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn csv_err(&self, source: csv::Error) -> DatasetError {
        DatasetError::Csv {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn read_table(&self) -> Result<Table, DatasetError> {
        let file = std::fs::File::open(&self.path).map_err(|e| self.io_err(e))?;
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(file);
        let headers = reader.headers().map_err(|e| self.csv_err(e))?.clone();
        let rows = reader
            .records()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| self.csv_err(e))?;
        let table = Table { headers, rows };
        for column in REQUIRED_COLUMNS {
            if table.column(column).is_none() {
                return Err(DatasetError::MissingColumn {
                    path: self.path.display().to_string(),
                    column: column.to_string(),
                });
            }
        }
        Ok(table)
    }

    /// Write via a sibling temp file so a failed write never truncates the roster.
    fn write_table(&self, table: &Table) -> Result<(), DatasetError> {
        let tmp = self.path.with_extension("csv.tmp");
        {
            let mut writer = csv::WriterBuilder::new()
                .flexible(true)
                .from_path(&tmp)
                .map_err(|e| self.csv_err(e))?;
            writer
                .write_record(&table.headers)
                .map_err(|e| self.csv_err(e))?;
            for row in &table.rows {
                writer.write_record(row).map_err(|e| self.csv_err(e))?;
            }
            writer.flush().map_err(|e| self.io_err(e))?;
        }
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))
    }

    fn row_from_fields(table: &Table, fields: &[(&'static str, String)]) -> StringRecord {
        let mut values = vec![String::new(); table.headers.len()];
        for (column, value) in fields {
            match table.column(column) {
                Some(i) => values[i] = value.clone(),
                None if value.is_empty() => {}
                None => warn!("roster has no `{}` column; dropping value {}", column, value),
            }
        }
        table.conform_percentages(&mut values, &PERCENT_COLUMNS, None);
        StringRecord::from(values)
    }

    /// Append a player. Creates the file with the standard header if needed.
    pub fn add(&self, record: &PlayerSeasonRecord) -> Result<(), DatasetError> {
        record.validate().map_err(|e| DatasetError::InvalidRecord {
            player: record.name.clone(),
            reason: e.to_string(),
        })?;

        let mut table = if self.path.exists() {
            self.read_table()?
        } else {
            Table {
                headers: StringRecord::from(COLUMNS.to_vec()),
                rows: Vec::new(),
            }
        };

        let name = record.name.trim();
        if table
            .rows
            .iter()
            .any(|row| table.name_of(row).as_deref() == Some(name))
        {
            return Err(DatasetError::DuplicatePlayer(name.to_string()));
        }

        let row = Self::row_from_fields(&table, &record_fields(record));
        table.rows.push(row);
        self.write_table(&table)?;
        info!("added '{}' to {}", name, self.path.display());
        Ok(())
    }

    /// Apply a patch to the first row whose name matches. The patched row is
    /// re-validated before anything is written.
    pub fn update(&self, name: &str, patch: &RecordPatch) -> Result<(), DatasetError> {
        let mut table = self.read_table()?;
        let name = name.trim();
        let index = table
            .rows
            .iter()
            .position(|row| table.name_of(row).as_deref() == Some(name))
            .ok_or_else(|| DatasetError::PlayerNotFound(name.to_string()))?;

        if let Some(new_name) = patch.name.as_deref().map(str::trim) {
            let clash = new_name != name
                && table
                    .rows
                    .iter()
                    .any(|row| table.name_of(row).as_deref() == Some(new_name));
            if clash {
                return Err(DatasetError::DuplicatePlayer(new_name.to_string()));
            }
        }

        let mut values: Vec<String> = table.rows[index].iter().map(str::to_string).collect();
        values.resize(table.headers.len(), String::new());
        let fields = patch.fields();
        for (column, value) in fields.iter().cloned() {
            match table.column(column) {
                Some(i) => values[i] = value,
                None => {
                    return Err(DatasetError::MissingColumn {
                        path: self.path.display().to_string(),
                        column: column.to_string(),
                    })
                }
            }
        }
        let columns: Vec<&str> = fields.iter().map(|(c, _)| *c).collect();
        table.conform_percentages(&mut values, &columns, Some(index));
        let patched = StringRecord::from(values);
        parse_row(&table.headers, &patched).map_err(|reason| DatasetError::InvalidRecord {
            player: name.to_string(),
            reason,
        })?;

        table.rows[index] = patched;
        self.write_table(&table)?;
        info!("updated '{}' in {}", name, self.path.display());
        Ok(())
    }

    /// Remove every row with the given name. Returns the number removed.
    pub fn remove(&self, name: &str) -> Result<usize, DatasetError> {
        let mut table = self.read_table()?;
        let name = name.trim();
        let before = table.rows.len();
        let column = table.column("player_name");
        table.rows.retain(|row| {
            column
                .and_then(|i| row.get(i))
                .map(str::trim)
                != Some(name)
        });
        let removed = before - table.rows.len();
        if removed == 0 {
            return Err(DatasetError::PlayerNotFound(name.to_string()));
        }
        self.write_table(&table)?;
        info!("removed {} row(s) for '{}' from {}", removed, name, self.path.display());
        Ok(removed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
