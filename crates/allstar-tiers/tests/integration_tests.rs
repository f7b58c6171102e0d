// Integration tests for the All-Star tier analysis.
//
// These exercise the public library API end to end against the fixture
// rosters in tests/fixtures: loading, scoring, classification, candidate
// evaluation, roster editing, and report output.

use allstar_tiers::config::{self, ConferenceFilter};
use allstar_tiers::dataset::loader::load_roster;
use allstar_tiers::dataset::record::{Conference, PlayerSeasonRecord, Tier};
use allstar_tiers::dataset::store::{RecordPatch, RosterStore};
use allstar_tiers::dataset::DatasetError;
use allstar_tiers::metric::cer::MetricKind;
use allstar_tiers::model::forest::MaxFeatures;
use allstar_tiers::pipeline::{self, AnalysisOptions, LabelSource};
use allstar_tiers::report;
use allstar_tiers::validation::grid::ForestGrid;

use std::fs;
use std::path::{Path, PathBuf};

const FIXTURES: &str = "tests/fixtures";

// ===========================================================================
// Helpers
// ===========================================================================

fn fixture(name: &str) -> PathBuf {
    Path::new(FIXTURES).join(name)
}

/// Small grid and three folds so the forest runs stay quick.
fn quick_options() -> AnalysisOptions {
    AnalysisOptions {
        grid: ForestGrid {
            n_trees: vec![10, 20],
            max_features: vec![MaxFeatures::Sqrt, MaxFeatures::All],
            max_depth: vec![None],
            min_samples_split: 2,
            seed: 11,
        },
        folds: 3,
        ..Default::default()
    }
}

/// Copy a fixture into a fresh temp directory so edits never touch it.
fn temp_copy(tag: &str, name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("allstar_it_{tag}"));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    let dest = dir.join(name);
    fs::copy(fixture(name), &dest).unwrap();
    dest
}

/// A season that outproduces everyone in the fixture roster.
fn superstar() -> PlayerSeasonRecord {
    PlayerSeasonRecord {
        name: "Prime Wilt".into(),
        conference: Some(Conference::East),
        games_played: 82,
        minutes_per_game: Some(38.0),
        points: 40.0,
        rebounds: 14.0,
        assists: 11.0,
        steals: 2.5,
        blocks: 2.5,
        turnovers: 1.0,
        fg_pct: 0.65,
        ft_pct: 0.93,
        three_pct: Some(0.42),
        two_pct: Some(0.68),
        salary: Some(50_000_000),
        tier: None,
    }
}

// ===========================================================================
// Loading
// ===========================================================================

#[test]
fn labelled_fixture_loads_every_row() {
    let roster = load_roster(&fixture("allstars.csv")).unwrap();
    assert_eq!(roster.records.len(), 24);
    assert!(roster.rejected.is_empty());

    let count = |tier| roster.records.iter().filter(|r| r.tier == Some(tier)).count();
    assert_eq!(count(Tier::Mvp), 4);
    assert_eq!(count(Tier::AllNba), 8);
    assert_eq!(count(Tier::AllStar), 12);

    let jokic = &roster.records[0];
    assert_eq!(jokic.name, "Nikola Jokic");
    assert_eq!(jokic.conference, Some(Conference::West));
    assert_eq!(jokic.games_played, 79);
    assert_eq!(jokic.salary, Some(47_607_350));
}

#[test]
fn raw_fixture_rejects_bad_rows_and_rescales_percentages() {
    let roster = load_roster(&fixture("allstars_raw.csv")).unwrap();
    assert_eq!(roster.records.len(), 8);

    let lines: Vec<Option<u64>> = roster.rejected.iter().map(|r| r.line).collect();
    assert_eq!(lines, vec![Some(5), Some(8)]);
    assert_eq!(roster.rejected[0].player, "Injured Reserve");
    assert_eq!(roster.rejected[1].player, "Broken Shooter");

    let jokic = roster.records.iter().find(|r| r.name == "Nikola Jokic").unwrap();
    assert!((jokic.fg_pct - 0.583).abs() < 1e-9);
    assert!((jokic.ft_pct - 0.817).abs() < 1e-9);
    assert!((jokic.three_pct.unwrap() - 0.359).abs() < 1e-9);
    assert!(roster.records.iter().all(|r| r.tier.is_none()));
    assert!(roster
        .records
        .iter()
        .all(|r| r.fg_pct <= 1.0 && r.ft_pct <= 1.0));
}

#[test]
fn missing_roster_is_an_io_error() {
    let err = load_roster(&fixture("no_such_roster.csv")).unwrap_err();
    assert!(matches!(err, DatasetError::Io { .. }));
}

// ===========================================================================
// Scoring
// ===========================================================================

#[test]
fn scores_are_ranked_descending_with_quantile_tiers() {
    let roster = load_roster(&fixture("allstars.csv")).unwrap();
    let report = pipeline::score_roster(&roster, &quick_options()).unwrap();

    assert_eq!(report.players.len(), 24);
    for (i, pair) in report.players.windows(2).enumerate() {
        assert!(pair[0].cer >= pair[1].cer, "rank {} out of order", i + 1);
        assert_eq!(pair[0].rank + 1, pair[1].rank);
    }
    assert_eq!(report.players[0].metric_tier, Tier::Mvp);
    assert_eq!(report.players[23].metric_tier, Tier::AllStar);

    // Tiers never climb as the metric falls.
    for pair in report.players.windows(2) {
        assert!(pair[0].metric_tier.index() <= pair[1].metric_tier.index());
    }
}

#[test]
fn conference_filter_splits_the_fixture_evenly() {
    let roster = load_roster(&fixture("allstars.csv")).unwrap();
    let west = pipeline::score_roster(
        &roster,
        &AnalysisOptions {
            conference: ConferenceFilter::West,
            ..quick_options()
        },
    )
    .unwrap();
    let east = pipeline::score_roster(
        &roster,
        &AnalysisOptions {
            conference: ConferenceFilter::East,
            ..quick_options()
        },
    )
    .unwrap();

    assert_eq!(west.players.len(), 12);
    assert_eq!(east.players.len(), 12);
    assert!(west
        .players
        .iter()
        .all(|p| p.conference == Some(Conference::West)));
}

#[test]
fn mvpcem_ranking_available_for_complete_shooting_splits() {
    let roster = load_roster(&fixture("allstars.csv")).unwrap();
    let opts = AnalysisOptions {
        metric: MetricKind::Mvpcem,
        ..quick_options()
    };
    let report = pipeline::score_roster(&roster, &opts).unwrap();
    assert_eq!(report.players.len(), 24);
    assert!(report.players.iter().all(|p| p.mvpcem.is_some()));
    for pair in report.players.windows(2) {
        assert!(pair[0].mvpcem >= pair[1].mvpcem);
    }
}

#[test]
fn raw_fixture_scores_carry_rejections_forward() {
    let roster = load_roster(&fixture("allstars_raw.csv")).unwrap();
    let report = pipeline::score_roster(&roster, &quick_options()).unwrap();
    assert_eq!(report.players.len(), 8);
    assert_eq!(report.rejected.len(), 2);
}

// ===========================================================================
// Classification
// ===========================================================================

#[test]
fn full_analysis_on_labelled_roster() {
    let roster = load_roster(&fixture("allstars.csv")).unwrap();
    let opts = quick_options();
    let analysis = pipeline::run_analysis(&roster, &opts).unwrap();

    assert_eq!(analysis.label_source, LabelSource::Dataset);
    assert_eq!(analysis.players.len(), 24);
    assert_eq!(analysis.grid.len(), opts.grid.candidates().len());
    assert!(opts.grid.candidates().contains(&analysis.best_params));

    assert_eq!(analysis.cross_validation.folds.len(), 3);
    let fold_total: usize = analysis.cross_validation.folds.iter().map(|f| f.size).sum();
    assert_eq!(fold_total, 24);
    assert!((0.0..=1.0).contains(&analysis.cross_validation.mean_accuracy));

    let loo = analysis.leave_one_out_accuracy.unwrap();
    assert!((0.0..=1.0).contains(&loo));
    assert!(analysis.players.iter().all(|p| p.loo_tier.is_some()));

    assert_eq!(analysis.confusion.total(), 24);
    assert_eq!(analysis.class_metrics.len(), 3);
    let support: usize = analysis.class_metrics.iter().map(|m| m.support).sum();
    assert_eq!(support, 24);

    assert_eq!(analysis.clustering.k, 3);
    assert!((0.0..=1.0).contains(&analysis.clustering.agreement));

    for p in &analysis.players {
        assert!(p.confidence > 0.0 && p.confidence <= 1.0);
        let record = roster.records.iter().find(|r| r.name == p.name).unwrap();
        assert_eq!(Some(p.label), record.tier);
    }
}

#[test]
fn unlabelled_roster_falls_back_to_quantile_labels() {
    let roster = load_roster(&fixture("allstars_raw.csv")).unwrap();
    let opts = AnalysisOptions {
        leave_one_out: false,
        ..quick_options()
    };
    let analysis = pipeline::run_analysis(&roster, &opts).unwrap();

    assert_eq!(analysis.label_source, LabelSource::Quantile);
    assert_eq!(analysis.leave_one_out_accuracy, None);
    for p in &analysis.players {
        assert_eq!(p.label, p.metric_tier);
        assert_eq!(p.loo_tier, None);
    }
}

#[test]
fn analysis_is_reproducible_for_fixed_seeds() {
    let roster = load_roster(&fixture("allstars.csv")).unwrap();
    let opts = AnalysisOptions {
        leave_one_out: false,
        ..quick_options()
    };
    let a = pipeline::run_analysis(&roster, &opts).unwrap();
    let b = pipeline::run_analysis(&roster, &opts).unwrap();

    assert_eq!(a.best_params, b.best_params);
    assert_eq!(a.cross_validation.mean_accuracy, b.cross_validation.mean_accuracy);
    let tiers = |r: &pipeline::AnalysisReport| -> Vec<Tier> {
        r.players.iter().map(|p| p.predicted_tier).collect()
    };
    assert_eq!(tiers(&a), tiers(&b));
}

// ===========================================================================
// Candidate evaluation
// ===========================================================================

#[test]
fn dominant_candidate_lands_in_top_metric_tier() {
    let roster = load_roster(&fixture("allstars.csv")).unwrap();
    let result = pipeline::evaluate_candidate(&roster, &superstar(), &quick_options()).unwrap();

    assert_eq!(result.name, "Prime Wilt");
    assert_eq!(result.cohort_size, 24);
    assert_eq!(result.metric_tier, Tier::Mvp);
    assert!(result.mvpcem.is_some());
    assert!(result.confidence > 0.0 && result.confidence <= 1.0);

    let text = report::render_candidate(&result);
    assert!(text.contains("Prime Wilt"));
    assert!(text.contains("MVP"));
}

#[test]
fn invalid_candidate_is_refused() {
    let roster = load_roster(&fixture("allstars.csv")).unwrap();
    let mut candidate = superstar();
    candidate.games_played = 0;
    assert!(pipeline::evaluate_candidate(&roster, &candidate, &quick_options()).is_err());
}

// ===========================================================================
// Roster editing
// ===========================================================================

#[test]
fn add_update_remove_round_trip_through_the_file() {
    let path = temp_copy("store_cycle", "allstars.csv");
    let store = RosterStore::new(&path);

    store.add(&superstar()).unwrap();
    let roster = load_roster(&path).unwrap();
    assert_eq!(roster.records.len(), 25);
    let added = roster.records.iter().find(|r| r.name == "Prime Wilt").unwrap();
    assert_eq!(added.games_played, 82);

    let patch = RecordPatch {
        games_played: Some(41),
        points: Some(31.5),
        ..Default::default()
    };
    store.update("Prime Wilt", &patch).unwrap();
    let roster = load_roster(&path).unwrap();
    let updated = roster.records.iter().find(|r| r.name == "Prime Wilt").unwrap();
    assert_eq!(updated.games_played, 41);
    assert!((updated.points - 31.5).abs() < 1e-9);
    assert!((updated.rebounds - 14.0).abs() < 1e-9);

    assert_eq!(store.remove("Prime Wilt").unwrap(), 1);
    let roster = load_roster(&path).unwrap();
    assert_eq!(roster.records.len(), 24);

    let _ = fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn whole_number_percentages_keep_the_roster_scale() {
    let path = temp_copy("store_scale", "allstars.csv");
    let before = load_roster(&path).unwrap();
    let before_scores = pipeline::score_roster(&before, &quick_options()).unwrap();

    let mut rookie = superstar();
    rookie.name = "Scale Rookie".into();
    rookie.fg_pct = 47.0;
    rookie.ft_pct = 80.0;
    rookie.three_pct = Some(36.0);
    rookie.two_pct = Some(52.0);
    RosterStore::new(&path).add(&rookie).unwrap();

    let after = load_roster(&path).unwrap();
    assert_eq!(after.records.len(), 25);
    for old in &before.records {
        let new = after.records.iter().find(|r| r.name == old.name).unwrap();
        assert_eq!(new.fg_pct, old.fg_pct, "{} fg% changed", old.name);
        assert_eq!(new.ft_pct, old.ft_pct, "{} ft% changed", old.name);
        assert_eq!(new.three_pct, old.three_pct, "{} 3p% changed", old.name);
    }
    let added = after.records.iter().find(|r| r.name == "Scale Rookie").unwrap();
    assert!((added.fg_pct - 0.47).abs() < 1e-12);
    assert!((added.ft_pct - 0.80).abs() < 1e-12);

    // Removing the newcomer restores every score exactly.
    RosterStore::new(&path).remove("Scale Rookie").unwrap();
    let restored = load_roster(&path).unwrap();
    let restored_scores = pipeline::score_roster(&restored, &quick_options()).unwrap();
    let cer = |r: &pipeline::ScoreReport| -> Vec<f64> { r.players.iter().map(|p| p.cer).collect() };
    assert_eq!(cer(&before_scores), cer(&restored_scores));

    let _ = fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn store_refuses_duplicates_and_unknown_players() {
    let path = temp_copy("store_errors", "allstars.csv");
    let store = RosterStore::new(&path);

    let mut dup = superstar();
    dup.name = "Nikola Jokic".into();
    assert!(matches!(store.add(&dup), Err(DatasetError::DuplicatePlayer(_))));
    assert!(matches!(
        store.remove("Nobody Special"),
        Err(DatasetError::PlayerNotFound(_))
    ));

    let bad = RecordPatch {
        fg_pct: Some(250.0),
        ..Default::default()
    };
    assert!(matches!(
        store.update("Nikola Jokic", &bad),
        Err(DatasetError::InvalidRecord { .. })
    ));
    // A refused edit leaves the file as it was.
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        fs::read_to_string(fixture("allstars.csv")).unwrap()
    );

    let _ = fs::remove_dir_all(path.parent().unwrap());
}

// ===========================================================================
// Reports
// ===========================================================================

#[test]
fn analysis_reports_written_to_disk() {
    let roster = load_roster(&fixture("allstars.csv")).unwrap();
    let opts = AnalysisOptions {
        leave_one_out: false,
        ..quick_options()
    };
    let analysis = pipeline::run_analysis(&roster, &opts).unwrap();

    let dir = std::env::temp_dir().join("allstar_it_reports");
    let _ = fs::remove_dir_all(&dir);
    report::write_json(&dir.join("analysis.json"), &analysis).unwrap();
    report::write_csv_rows(&dir.join("players.csv"), &analysis.players).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.join("analysis.json")).unwrap()).unwrap();
    assert_eq!(json["label_source"], "dataset");
    assert_eq!(json["players"].as_array().unwrap().len(), 24);
    assert_eq!(json["grid"].as_array().unwrap().len(), 4);

    let csv_text = fs::read_to_string(dir.join("players.csv")).unwrap();
    let header = csv_text.lines().next().unwrap();
    assert!(header.starts_with("rank,name,conference"));
    assert!(header.contains("predicted_tier"));
    assert_eq!(csv_text.lines().count(), 25);

    let summary = report::render_summary(&analysis);
    assert!(summary.contains("24 players"));
    assert!(summary.contains("3-fold accuracy"));

    let _ = fs::remove_dir_all(&dir);
}

// ===========================================================================
// Configuration
// ===========================================================================

#[test]
fn load_config_seeds_a_fresh_base_dir_from_defaults() {
    let base = std::env::temp_dir().join("allstar_it_config");
    let _ = fs::remove_dir_all(&base);
    fs::create_dir_all(base.join("defaults")).unwrap();
    fs::copy("defaults/analysis.toml", base.join("defaults/analysis.toml")).unwrap();

    let config = config::load_config(&base).unwrap();
    assert!(base.join("config/analysis.toml").exists());
    assert_eq!(config.metric.primary, MetricKind::Cer);
    assert_eq!(config.validation.folds, 5);

    let opts = AnalysisOptions::from_config(&config);
    assert_eq!(opts.grid.candidates().len(), 27);
    assert!(opts.grid.max_depth.contains(&None));
    assert_eq!(
        config::resolve_path(&base, &config.data.roster),
        base.join("data/allstars.csv")
    );

    let _ = fs::remove_dir_all(&base);
}
