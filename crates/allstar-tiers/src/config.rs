// Configuration loading and parsing (analysis.toml).

use crate::dataset::record::Conference;
use crate::metric::cer::MetricKind;
use crate::metric::normalize::Normalization;
use crate::model::features::FeatureSet;
use crate::model::forest::MaxFeatures;
use crate::model::kmeans::{KMeansInit, KMeansParams};
use crate::validation::grid::ForestGrid;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE: &str = "analysis.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// analysis.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub data: DataConfig,
    pub metric: MetricConfig,
    pub clustering: ClusteringConfig,
    pub forest: ForestConfig,
    pub validation: ValidationConfig,
}

/// Which conference's players take part in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ConferenceFilter {
    #[default]
    All,
    East,
    West,
}

impl ConferenceFilter {
    /// Records without a conference only pass the `All` filter.
    pub fn matches(self, conference: Option<Conference>) -> bool {
        match self {
            ConferenceFilter::All => true,
            ConferenceFilter::East => conference == Some(Conference::East),
            ConferenceFilter::West => conference == Some(Conference::West),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataConfig {
    /// Roster CSV, relative to the base directory unless absolute.
    pub roster: String,
    pub output_dir: String,
    #[serde(default)]
    pub conference: ConferenceFilter,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricConfig {
    /// Metric used for labels, features and clustering.
    pub primary: MetricKind,
    #[serde(default)]
    pub normalization: Normalization,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClusteringConfig {
    pub k: usize,
    pub max_iterations: usize,
    #[serde(default)]
    pub init: KMeansInit,
    pub seed: u64,
}

impl ClusteringConfig {
    pub fn params(&self) -> KMeansParams {
        KMeansParams {
            k: self.k,
            max_iterations: self.max_iterations,
            init: self.init,
            seed: self.seed,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForestConfig {
    #[serde(default)]
    pub features: FeatureSet,
    pub min_samples_split: usize,
    pub seed: u64,
    pub n_trees: Vec<usize>,
    pub max_features: Vec<MaxFeatures>,
    /// 0 means unlimited depth.
    pub max_depth: Vec<usize>,
}

impl ForestConfig {
    pub fn grid(&self) -> ForestGrid {
        ForestGrid {
            n_trees: self.n_trees.clone(),
            max_features: self.max_features.clone(),
            max_depth: self
                .max_depth
                .iter()
                .map(|&d| (d > 0).then_some(d))
                .collect(),
            min_samples_split: self.min_samples_split,
            seed: self.seed,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ValidationConfig {
    pub folds: usize,
    pub leave_one_out: bool,
    pub seed: u64,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/analysis.toml` relative to `base_dir`.
///
/// This is the lower-level loading primitive that does not auto-copy defaults.
/// Prefer `load_config()` which handles default initialization automatically.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = read_file(&path)?;
    let config = parse_config(&text, &path)?;
    validate(&config)?;
    Ok(config)
}

pub(crate) fn parse_config(text: &str, path: &Path) -> Result<Config, ConfigError> {
    toml::from_str(text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or pass --base-dir",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let mut copied = Vec::new();

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }
        let target = config_dir.join(file_name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Copy missing defaults into `base_dir/config`, then load.
pub fn load_config(base_dir: &Path) -> Result<Config, ConfigError> {
    ensure_config_files(base_dir)?;
    load_config_from(base_dir)
}

/// Resolve a configured path against `base_dir` unless it is absolute.
pub fn resolve_path(base_dir: &Path, configured: &str) -> PathBuf {
    let p = Path::new(configured);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.data.roster.trim().is_empty() {
        return Err(invalid("data.roster", "must not be empty"));
    }
    if config.data.output_dir.trim().is_empty() {
        return Err(invalid("data.output_dir", "must not be empty"));
    }

    let c = &config.clustering;
    if c.k == 0 {
        return Err(invalid("clustering.k", "must be > 0"));
    }
    if c.max_iterations == 0 {
        return Err(invalid("clustering.max_iterations", "must be > 0"));
    }

    let f = &config.forest;
    if f.min_samples_split < 2 {
        return Err(invalid(
            "forest.min_samples_split",
            format!("must be >= 2, got {}", f.min_samples_split),
        ));
    }
    let grid_fields: &[(&str, usize)] = &[
        ("forest.n_trees", f.n_trees.len()),
        ("forest.max_features", f.max_features.len()),
        ("forest.max_depth", f.max_depth.len()),
    ];
    for (name, len) in grid_fields {
        if *len == 0 {
            return Err(invalid(name, "must list at least one candidate"));
        }
    }
    if f.n_trees.contains(&0) {
        return Err(invalid("forest.n_trees", "every tree count must be > 0"));
    }

    if config.validation.folds < 2 {
        return Err(invalid(
            "validation.folds",
            format!("must be >= 2, got {}", config.validation.folds),
        ));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Crate root, where `defaults/` lives.
    fn project_root() -> PathBuf {
        let cwd = std::env::current_dir().unwrap();
        if cwd.join("defaults").exists() {
            cwd
        } else if cwd.join("crates/allstar-tiers/defaults").exists() {
            cwd.join("crates/allstar-tiers")
        } else {
            panic!("Cannot locate defaults/ directory from CWD {:?}", cwd);
        }
    }

    fn default_text() -> String {
        fs::read_to_string(project_root().join("defaults").join(CONFIG_FILE)).unwrap()
    }

    /// Write `text` as config/analysis.toml under a fresh temp dir.
    fn temp_config(name: &str, text: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::write(tmp.join("config").join(CONFIG_FILE), text).unwrap();
        tmp
    }

    fn expect_field(err: ConfigError, expected: &str) {
        match err {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, expected),
            other => panic!("expected ValidationError, got: {other}"),
        }
    }

    #[test]
    fn default_config_parses_and_validates() {
        let tmp = temp_config("allstar_config_defaults", &default_text());
        let config = load_config_from(&tmp).expect("defaults should load");

        assert_eq!(config.data.roster, "data/allstars.csv");
        assert_eq!(config.data.output_dir, "output");
        assert_eq!(config.data.conference, ConferenceFilter::All);
        assert_eq!(config.metric.primary, MetricKind::Cer);
        assert_eq!(config.metric.normalization, Normalization::MinMax);
        assert_eq!(config.clustering.k, 3);
        assert_eq!(config.clustering.init, KMeansInit::KMeansPlusPlus);
        assert_eq!(config.forest.features, FeatureSet::MetricAndStats);
        assert_eq!(config.forest.n_trees, vec![50, 100, 200]);
        assert_eq!(config.validation.folds, 5);
        assert!(config.validation.leave_one_out);

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn forest_grid_maps_zero_depth_to_unlimited() {
        let config = parse_config(&default_text(), Path::new("analysis.toml")).unwrap();
        let grid = config.forest.grid();
        assert_eq!(grid.max_depth, vec![None, Some(3), Some(5)]);
        assert_eq!(grid.candidates().len(), 27);
    }

    #[test]
    fn clustering_params_copy_fields() {
        let config = parse_config(&default_text(), Path::new("analysis.toml")).unwrap();
        let p = config.clustering.params();
        assert_eq!(p.k, 3);
        assert_eq!(p.max_iterations, config.clustering.max_iterations);
        assert_eq!(p.seed, config.clustering.seed);
    }

    #[test]
    fn conference_filter_matches() {
        assert!(ConferenceFilter::All.matches(None));
        assert!(ConferenceFilter::East.matches(Some(Conference::East)));
        assert!(!ConferenceFilter::East.matches(Some(Conference::West)));
        assert!(!ConferenceFilter::West.matches(None));
    }

    #[test]
    fn rejects_zero_k() {
        let text = default_text().replace("k = 3", "k = 0");
        let tmp = temp_config("allstar_config_zero_k", &text);
        expect_field(load_config_from(&tmp).unwrap_err(), "clustering.k");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_single_fold() {
        let text = default_text().replace("folds = 5", "folds = 1");
        let tmp = temp_config("allstar_config_one_fold", &text);
        expect_field(load_config_from(&tmp).unwrap_err(), "validation.folds");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_empty_tree_grid() {
        let text = default_text().replace("n_trees = [50, 100, 200]", "n_trees = []");
        let tmp = temp_config("allstar_config_empty_grid", &text);
        expect_field(load_config_from(&tmp).unwrap_err(), "forest.n_trees");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_small_min_samples_split() {
        let text = default_text().replace("min_samples_split = 2", "min_samples_split = 1");
        let tmp = temp_config("allstar_config_min_split", &text);
        expect_field(load_config_from(&tmp).unwrap_err(), "forest.min_samples_split");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn unknown_metric_is_a_parse_error() {
        let text = default_text().replace("primary = \"cer\"", "primary = \"per\"");
        let tmp = temp_config("allstar_config_bad_metric", &text);
        match load_config_from(&tmp).unwrap_err() {
            ConfigError::ParseError { path, .. } => assert!(path.ends_with(CONFIG_FILE)),
            other => panic!("expected ParseError, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn file_not_found_for_missing_config() {
        let tmp = std::env::temp_dir().join("allstar_config_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        match load_config_from(&tmp).unwrap_err() {
            ConfigError::FileNotFound { path } => assert!(path.ends_with(CONFIG_FILE)),
            other => panic!("expected FileNotFound, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_copies_missing_files() {
        let tmp = std::env::temp_dir().join("allstar_config_ensure_copies");
        let _ = fs::remove_dir_all(&tmp);
        let defaults_dir = tmp.join("defaults");
        fs::create_dir_all(&defaults_dir).unwrap();
        fs::write(defaults_dir.join(CONFIG_FILE), default_text()).unwrap();
        fs::write(defaults_dir.join("analysis.toml.example"), "# example\n").unwrap();

        let copied = ensure_config_files(&tmp).expect("should succeed");
        assert_eq!(copied.len(), 1);
        assert!(tmp.join("config").join(CONFIG_FILE).exists());
        assert!(!tmp.join("config/analysis.toml.example").exists());

        // second run copies nothing and keeps edits
        fs::write(tmp.join("config").join(CONFIG_FILE), "# custom\n").unwrap();
        assert!(ensure_config_files(&tmp).unwrap().is_empty());
        let content = fs::read_to_string(tmp.join("config").join(CONFIG_FILE)).unwrap();
        assert_eq!(content, "# custom\n");

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_errors_when_both_dirs_missing() {
        let tmp = std::env::temp_dir().join("allstar_config_both_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();
        match ensure_config_files(&tmp).unwrap_err() {
            ConfigError::DefaultsCopyError { message } => {
                assert!(message.contains("neither defaults/ nor config/"));
            }
            other => panic!("expected DefaultsCopyError, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn resolve_path_keeps_absolute_paths() {
        let base = Path::new("/srv/allstar");
        assert_eq!(
            resolve_path(base, "data/allstars.csv"),
            PathBuf::from("/srv/allstar/data/allstars.csv")
        );
        assert_eq!(resolve_path(base, "/tmp/x.csv"), PathBuf::from("/tmp/x.csv"));
    }
}
