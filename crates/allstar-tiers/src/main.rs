// All-Star tier analysis entry point.
//
// 1. Parse the command line
// 2. Initialize tracing (stderr, so stdout carries only results)
// 3. Load config, applying command-line overrides
// 4. Dispatch the subcommand

use allstar_tiers::config::{self, resolve_path, ConferenceFilter, Config};
use allstar_tiers::dataset::loader::load_roster;
use allstar_tiers::dataset::record::{Conference, PlayerSeasonRecord, Tier};
use allstar_tiers::dataset::store::{RecordPatch, RosterStore};
use allstar_tiers::metric::cer::MetricKind;
use allstar_tiers::metric::normalize::Normalization;
use allstar_tiers::metric::score_member;
use allstar_tiers::pipeline::{self, AnalysisOptions};
use allstar_tiers::report;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Score NBA All-Star seasons with CER and classify them into tiers
#[derive(Parser)]
#[command(name = "allstar", version)]
struct Cli {
    /// Directory holding config/ and defaults/
    #[arg(long, global = true, default_value = ".")]
    base_dir: PathBuf,

    /// Roster CSV (overrides data.roster; relative to the current directory)
    #[arg(long, global = true)]
    roster: Option<PathBuf>,

    /// Output directory (overrides data.output_dir; relative to the current directory)
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Primary metric (overrides metric.primary)
    #[arg(long, global = true, value_enum)]
    metric: Option<MetricKind>,

    /// Restrict the cohort to one conference (overrides data.conference)
    #[arg(long, global = true, value_enum)]
    filter: Option<ConferenceFilter>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rank the roster by the primary metric and write scores.csv
    Score,
    /// Cluster, tune, and validate tier models; write analysis.json and players.csv
    Classify {
        /// Skip leave-one-out validation
        #[arg(long)]
        no_loo: bool,
    },
    /// Score a hypothetical player against the roster
    Evaluate(PlayerArgs),
    /// Append a player row to the roster file
    Add(PlayerArgs),
    /// Change fields of an existing player row
    Update {
        /// Player to update (exact name)
        name: String,
        #[command(flatten)]
        patch: PatchArgs,
    },
    /// Delete every row for a player
    Remove {
        /// Player to remove (exact name)
        name: String,
    },
}

/// A full player-season. Percentages may be fractions or 0-100; `add`
/// stores them on the scale the roster file already uses.
#[derive(Args)]
struct PlayerArgs {
    name: String,
    #[arg(long)]
    conference: Option<Conference>,
    #[arg(long)]
    games: u32,
    #[arg(long)]
    mp: Option<f64>,
    #[arg(long)]
    ppg: f64,
    #[arg(long)]
    rpg: f64,
    #[arg(long)]
    apg: f64,
    #[arg(long)]
    spg: f64,
    #[arg(long)]
    bpg: f64,
    #[arg(long)]
    tov: f64,
    #[arg(long)]
    fg: f64,
    #[arg(long)]
    ft: f64,
    #[arg(long)]
    three: Option<f64>,
    #[arg(long)]
    two: Option<f64>,
    #[arg(long)]
    salary: Option<u64>,
    #[arg(long)]
    tier: Option<Tier>,
}

impl PlayerArgs {
    fn into_record(self) -> PlayerSeasonRecord {
        PlayerSeasonRecord {
            name: self.name,
            conference: self.conference,
            games_played: self.games,
            minutes_per_game: self.mp,
            points: self.ppg,
            rebounds: self.rpg,
            assists: self.apg,
            steals: self.spg,
            blocks: self.bpg,
            turnovers: self.tov,
            fg_pct: self.fg,
            ft_pct: self.ft,
            three_pct: self.three,
            two_pct: self.two,
            salary: self.salary,
            tier: self.tier,
        }
    }
}

#[derive(Args)]
struct PatchArgs {
    /// New player name
    #[arg(long)]
    rename: Option<String>,
    #[arg(long)]
    conference: Option<Conference>,
    #[arg(long)]
    games: Option<u32>,
    #[arg(long)]
    mp: Option<f64>,
    #[arg(long)]
    ppg: Option<f64>,
    #[arg(long)]
    rpg: Option<f64>,
    #[arg(long)]
    apg: Option<f64>,
    #[arg(long)]
    spg: Option<f64>,
    #[arg(long)]
    bpg: Option<f64>,
    #[arg(long)]
    tov: Option<f64>,
    #[arg(long)]
    fg: Option<f64>,
    #[arg(long)]
    ft: Option<f64>,
    #[arg(long)]
    three: Option<f64>,
    #[arg(long)]
    two: Option<f64>,
    #[arg(long)]
    salary: Option<u64>,
    #[arg(long)]
    tier: Option<Tier>,
}

impl From<PatchArgs> for RecordPatch {
    fn from(a: PatchArgs) -> Self {
        RecordPatch {
            name: a.rename,
            conference: a.conference,
            games_played: a.games,
            minutes_per_game: a.mp,
            points: a.ppg,
            rebounds: a.rpg,
            assists: a.apg,
            steals: a.spg,
            blocks: a.bpg,
            turnovers: a.tov,
            fg_pct: a.fg,
            three_pct: a.three,
            two_pct: a.two,
            ft_pct: a.ft,
            salary: a.salary,
            tier: a.tier,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing()?;

    let mut config = config::load_config(&cli.base_dir).context("failed to load configuration")?;
    let cwd = std::env::current_dir().context("failed to read the current directory")?;
    apply_overrides(&mut config, &cli, &cwd);
    let roster_path = resolve_path(&cli.base_dir, &config.data.roster);
    let output_dir = resolve_path(&cli.base_dir, &config.data.output_dir);
    let mut opts = AnalysisOptions::from_config(&config);

    match cli.command {
        Command::Score => {
            let roster = load_roster(&roster_path)
                .with_context(|| format!("failed to load roster {}", roster_path.display()))?;
            let scores = pipeline::score_roster(&roster, &opts).context("scoring failed")?;
            report::write_csv_rows(&output_dir.join("scores.csv"), &scores.players)?;
            report::write_json(&output_dir.join("scores.json"), &scores)?;
            print!("{}", report::render_scores(&scores));
            info!("wrote scores to {}", output_dir.display());
        }
        Command::Classify { no_loo } => {
            if no_loo {
                opts.leave_one_out = false;
            }
            let roster = load_roster(&roster_path)
                .with_context(|| format!("failed to load roster {}", roster_path.display()))?;
            let analysis = pipeline::run_analysis(&roster, &opts).context("analysis failed")?;
            report::write_json(&output_dir.join("analysis.json"), &analysis)?;
            report::write_csv_rows(&output_dir.join("players.csv"), &analysis.players)?;
            print!("{}", report::render_summary(&analysis));
            info!("wrote analysis to {}", output_dir.display());
        }
        Command::Evaluate(args) => {
            let roster = load_roster(&roster_path)
                .with_context(|| format!("failed to load roster {}", roster_path.display()))?;
            let mut candidate = args.into_record();
            to_fractions(&mut candidate);
            let result = pipeline::evaluate_candidate(&roster, &candidate, &opts)
                .with_context(|| format!("failed to evaluate '{}'", candidate.name))?;
            print!("{}", report::render_candidate(&result));
        }
        Command::Add(args) => {
            let record = args.into_record();
            RosterStore::new(&roster_path)
                .add(&record)
                .with_context(|| format!("failed to add '{}'", record.name))?;
            println!("added '{}' to {}", record.name, roster_path.display());
            print_member_scores(&roster_path, record.name.trim(), opts.normalization);
        }
        Command::Update { name, patch } => {
            let patch = RecordPatch::from(patch);
            if patch.is_empty() {
                bail!("nothing to update: pass at least one field flag");
            }
            RosterStore::new(&roster_path)
                .update(&name, &patch)
                .with_context(|| format!("failed to update '{name}'"))?;
            println!("updated '{}' in {}", name, roster_path.display());
            let current = patch.name.as_deref().unwrap_or(name.as_str()).trim();
            print_member_scores(&roster_path, current, opts.normalization);
        }
        Command::Remove { name } => {
            let removed = RosterStore::new(&roster_path)
                .remove(&name)
                .with_context(|| format!("failed to remove '{name}'"))?;
            println!("removed {} row(s) for '{}'", removed, name);
        }
    }

    Ok(())
}

/// Command-line paths are anchored at the current directory, so a
/// relative `--roster` means what the shell means by it.
fn apply_overrides(config: &mut Config, cli: &Cli, cwd: &Path) {
    if let Some(p) = &cli.roster {
        config.data.roster = cli_path(cwd, p);
    }
    if let Some(p) = &cli.output_dir {
        config.data.output_dir = cli_path(cwd, p);
    }
    if let Some(m) = cli.metric {
        config.metric.primary = m;
    }
    if let Some(c) = cli.filter {
        config.data.conference = c;
    }
}

fn cli_path(cwd: &Path, p: &Path) -> String {
    resolve_path(cwd, &p.to_string_lossy())
        .to_string_lossy()
        .into_owned()
}

/// Show an added or edited player's CER and MVPCEM against the rest of the
/// roster. The edit is already saved, so a scoring problem only warns.
fn print_member_scores(roster_path: &Path, name: &str, normalization: Normalization) {
    let roster = match load_roster(roster_path) {
        Ok(roster) => roster,
        Err(e) => {
            warn!("saved, but could not reload the roster to score '{}': {}", name, e);
            return;
        }
    };
    match score_member(&roster.records, name, normalization) {
        Some(Ok(scored)) => print!(
            "{}",
            report::render_member(&scored, roster.records.len().saturating_sub(1))
        ),
        Some(Err(e)) => warn!("saved, but '{}' could not be scored: {}", name, e),
        None => warn!("saved, but '{}' was not among the valid roster rows", name),
    }
}

/// The loaded roster holds fractions, so a candidate typed on the 0-100
/// scale is brought down to match.
fn to_fractions(record: &mut PlayerSeasonRecord) {
    let scale = |v: f64| if v > 1.0 { v / 100.0 } else { v };
    record.fg_pct = scale(record.fg_pct);
    record.ft_pct = scale(record.ft_pct);
    record.three_pct = record.three_pct.map(scale);
    record.two_pct = record.two_pct.map(scale);
}

/// Log to stderr; stdout is reserved for tables and summaries.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("allstar=info,allstar_tiers=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
