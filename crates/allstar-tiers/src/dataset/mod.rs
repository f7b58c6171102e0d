// Dataset layer: player-season records, CSV loading, and roster editing.

pub mod loader;
pub mod record;
pub mod store;

use serde::Serialize;
use thiserror::Error;

/// CSV columns in the order they are written for new roster files.
pub const COLUMNS: [&str; 16] = [
    "player_name",
    "conference",
    "games_played",
    "mp",
    "ppg",
    "rpg",
    "apg",
    "spg",
    "bpg",
    "to",
    "fg%",
    "3p%",
    "2p%",
    "ft%",
    "salary",
    "tier",
];

/// Columns every roster file must carry.
pub const REQUIRED_COLUMNS: [&str; 10] = [
    "player_name",
    "games_played",
    "ppg",
    "rpg",
    "apg",
    "spg",
    "bpg",
    "to",
    "fg%",
    "ft%",
];

/// A row excluded from the batch, with the reason it was excluded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRow {
    /// 1-based CSV line, when the row came from a file.
    pub line: Option<u64>,
    pub player: String,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("{path} produced zero valid rows ({rejected} rejected)")]
    Empty { path: String, rejected: usize },

    #[error("{path} is missing required column `{column}`")]
    MissingColumn { path: String, column: String },

    #[error("player '{0}' already exists in the roster")]
    DuplicatePlayer(String),

    #[error("player '{0}' not found in the roster")]
    PlayerNotFound(String),

    #[error("invalid record for '{player}': {reason}")]
    InvalidRecord { player: String, reason: String },
}
