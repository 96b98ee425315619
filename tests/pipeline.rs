use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use nhl_dataset::config::PipelineConfig;
use nhl_dataset::pipeline;
use nhl_dataset::stats::TrackedStat;

fn fixture_dir(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

fn temp_output(name: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("nhl_dataset_{}_{name}", std::process::id()));
    let _ = fs::remove_file(&path);
    path
}

fn config(data: &str, out: &PathBuf) -> PipelineConfig {
    PipelineConfig {
        data_dir: fixture_dir(data),
        output_path: out.clone(),
        ..PipelineConfig::default()
    }
}

struct Dataset {
    headers: Vec<String>,
    rows: Vec<HashMap<String, String>>,
}

impl Dataset {
    fn read(path: &PathBuf) -> Self {
        let mut rdr = csv::Reader::from_path(path).expect("dataset should be readable");
        let headers: Vec<String> = rdr
            .headers()
            .expect("dataset has a header")
            .iter()
            .map(|h| h.to_string())
            .collect();
        let rows = rdr
            .records()
            .map(|rec| {
                let rec = rec.expect("valid csv record");
                headers
                    .iter()
                    .cloned()
                    .zip(rec.iter().map(|v| v.to_string()))
                    .collect()
            })
            .collect();
        Self { headers, rows }
    }

    fn row(&self, game: &str, team: &str) -> &HashMap<String, String> {
        self.rows
            .iter()
            .find(|r| r["game_id"] == game && r["team_id"] == team)
            .unwrap_or_else(|| panic!("missing row {game}/{team}"))
    }
}

fn num(row: &HashMap<String, String>, col: &str) -> f64 {
    row[col]
        .parse::<f64>()
        .unwrap_or_else(|_| panic!("{col} should be numeric, got {:?}", row[col]))
}

#[test]
fn builds_dataset_from_fixture_directory() {
    let out = temp_output("fixture.csv");
    let summary = pipeline::run(&config("games", &out))
        .expect("pipeline should succeed")
        .expect("fixture batch has valid games");

    assert_eq!(summary.files_seen, 4);
    assert_eq!(summary.files_skipped, 2);
    assert_eq!(summary.records_seen, 6);
    assert_eq!(summary.games_kept, 4);
    assert_eq!(summary.records_skipped.get("team_count"), Some(&1));
    assert_eq!(summary.records_skipped.get("missing_date"), Some(&1));
    assert_eq!(summary.rows_written, 8);

    let data = Dataset::read(&out);
    assert_eq!(data.headers[0], "won");
    assert_eq!(data.headers.len(), 83);
    assert_eq!(data.rows.len(), 2 * summary.games_kept);

    let order: Vec<(String, String)> = data
        .rows
        .iter()
        .map(|r| (r["team_id"].clone(), r["game_id"].clone()))
        .collect();
    let expected: Vec<(String, String)> = [
        ("A", "G1"),
        ("A", "G2"),
        ("A", "G4"),
        ("B", "G1"),
        ("B", "G3"),
        ("B", "G4"),
        ("C", "G2"),
        ("C", "G3"),
    ]
    .iter()
    .map(|(t, g)| (t.to_string(), g.to_string()))
    .collect();
    assert_eq!(order, expected);

    let _ = fs::remove_file(&out);
}

#[test]
fn first_game_scenario() {
    let out = temp_output("scenario.csv");
    pipeline::run(&config("games", &out))
        .expect("pipeline should succeed")
        .expect("dataset written");
    let data = Dataset::read(&out);

    let a = data.row("G1", "A");
    let b = data.row("G1", "B");
    assert_eq!(a["won"], "1");
    assert_eq!(b["won"], "0");
    assert_eq!(a["rest_days"], "3.0");
    assert_eq!(b["rest_days"], "3.0");
    assert_eq!(a["season"], "2025");
    assert_eq!(b["season"], "2025");
    assert_eq!(a["date"], "2024-10-10");
    assert_eq!(a["season_win_pct"], "0.45");
    assert_eq!(a["rolling_score_3"], "");
    assert_eq!(a["rolling_pp_efficiency_10"], "");
    assert_eq!(a["opp_team_id"], "B");
    assert_eq!(a["opp_won"], "0");
    assert_eq!(a["is_home"], "1");
    assert_eq!(b["is_home"], "0");
    assert_eq!(a["save_pct"], "0.92");
    assert_eq!(a["spread"], "-1.5");
    assert_eq!(a["officials"], "Ref One|Ref Two");
    assert_eq!(a["rest_advantage"], "0.0");

    let _ = fs::remove_file(&out);
}

#[test]
fn later_games_use_only_prior_history() {
    let out = temp_output("history.csv");
    pipeline::run(&config("games", &out))
        .expect("pipeline should succeed")
        .expect("dataset written");
    let data = Dataset::read(&out);

    let a2 = data.row("G2", "A");
    assert_eq!(num(a2, "rest_days"), 2.0);
    assert_eq!(num(a2, "season_win_pct"), 1.0);
    assert_eq!(num(a2, "rolling_score_3"), 3.0);
    assert_eq!(a2["spread"], "");
    assert_eq!(num(a2, "favorite_moneyline"), 0.0);

    let a4 = data.row("G4", "A");
    assert_eq!(a4["won"], "0");
    assert_eq!(num(a4, "rest_days"), 7.0);
    assert_eq!(num(a4, "cum_wins"), 1.0);
    assert_eq!(num(a4, "cum_games"), 2.0);
    assert_eq!(num(a4, "season_win_pct"), 0.5);
    assert_eq!(num(a4, "rolling_score_3"), 2.0);
    assert_eq!(num(a4, "rolling_faceoff_win_pct_10"), 48.25);
    let eff = num(a4, "rolling_pp_efficiency_3");
    assert!((eff - 0.5 / 3.5).abs() < 1e-6);
    assert_eq!(num(a4, "opp_rest_days"), 7.0);
    assert_eq!(num(a4, "opp_season_win_pct"), 0.5);
    assert_eq!(num(a4, "rest_advantage"), 0.0);

    // A recorded no shots in G4, so B's save percentage falls back to the neutral value.
    let b4 = data.row("G4", "B");
    assert_eq!(num(b4, "save_pct"), 0.91);
    assert_eq!(b4["won"], "0");

    let _ = fs::remove_file(&out);
}

#[test]
fn opponent_columns_mirror_the_other_row() {
    let out = temp_output("mirror.csv");
    pipeline::run(&config("games", &out))
        .expect("pipeline should succeed")
        .expect("dataset written");
    let data = Dataset::read(&out);

    let mirrored: Vec<String> = data
        .headers
        .iter()
        .filter_map(|h| h.strip_prefix("opp_").map(|s| s.to_string()))
        .collect();
    assert_eq!(mirrored.len(), 29);

    for row in &data.rows {
        let others: Vec<_> = data
            .rows
            .iter()
            .filter(|o| o["game_id"] == row["game_id"] && o["team_id"] != row["team_id"])
            .collect();
        assert_eq!(others.len(), 1, "game {} needs exactly one opponent", row["game_id"]);
        let other = others[0];
        for col in &mirrored {
            assert_eq!(row[&format!("opp_{col}")], other[col], "opp_{col} mismatch");
        }
        let adv = num(row, "rest_days") - num(other, "rest_days");
        assert_eq!(num(row, "rest_advantage"), adv);
    }

    let _ = fs::remove_file(&out);
}

#[test]
fn outliers_are_clipped_before_rolling() {
    let out = temp_output("clip.csv");
    pipeline::run(&config("games", &out))
        .expect("pipeline should succeed")
        .expect("dataset written");
    let data = Dataset::read(&out);

    // Scores [1, 2, 2, 2, 2, 3, 4, 5]: the 99th percentile is 4 + 0.93.
    let (table, _) = pipeline::build_from_dir(&config("games", &out))
        .expect("build should succeed")
        .expect("fixture batch has valid games");
    let limit = table
        .thresholds
        .get(TrackedStat::Score)
        .expect("score threshold");
    assert!((limit - 4.93).abs() < 1e-9);

    let b3 = data.row("G3", "B");
    assert!((num(b3, "score") - 4.93).abs() < 1e-9);
    let b4 = data.row("G4", "B");
    assert!((num(b4, "rolling_score_3") - (2.0 + 4.93) / 2.0).abs() < 1e-9);
    for row in &data.rows {
        assert!(num(row, "score") <= 4.93 + 1e-9);
        let rest = num(row, "rest_days");
        assert!((0.0..=7.0).contains(&rest));
    }

    let _ = fs::remove_file(&out);
}

#[test]
fn rerun_is_byte_identical() {
    let first = temp_output("first.csv");
    let second = temp_output("second.csv");
    pipeline::run(&config("games", &first))
        .expect("first run")
        .expect("dataset written");
    pipeline::run(&config("games", &second))
        .expect("second run")
        .expect("dataset written");
    let a = fs::read(&first).expect("first output");
    let b = fs::read(&second).expect("second output");
    assert_eq!(a, b);

    let _ = fs::remove_file(&first);
    let _ = fs::remove_file(&second);
}

#[test]
fn no_valid_games_means_no_output_file() {
    let out = temp_output("empty.csv");
    let summary = pipeline::run(&config("empty_batch", &out)).expect("pipeline should succeed");
    assert!(summary.is_none());
    assert!(!out.exists());

    let missing = PipelineConfig {
        data_dir: fixture_dir("does_not_exist"),
        output_path: out.clone(),
        ..PipelineConfig::default()
    };
    assert!(pipeline::run(&missing).expect("missing dir is not an error").is_none());
    assert!(!out.exists());
}

#[test]
fn xlsx_output_is_written() {
    let out = temp_output("features.xlsx");
    let summary = pipeline::run(&config("games", &out))
        .expect("pipeline should succeed")
        .expect("dataset written");
    assert_eq!(summary.rows_written, 8);
    let bytes = fs::read(&out).expect("workbook exists");
    // xlsx files are zip archives.
    assert_eq!(&bytes[..2], b"PK");

    let _ = fs::remove_file(&out);
}
