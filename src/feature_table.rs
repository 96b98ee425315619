use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{NaiveDateTime, Timelike};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::config::PipelineConfig;
use crate::derived;
use crate::flatten::TeamGameRow;
use crate::opponent::{OpponentMirror, join_opponents};
use crate::outliers::{ClipThresholds, clip_outliers};
use crate::stats::TrackedStat;
use crate::temporal::{TemporalFeatures, build_temporal_features};

/// One output row: a team's game, its own history features and its opponent's mirror.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub game: TeamGameRow,
    pub temporal: TemporalFeatures,
    pub opponent: OpponentMirror,
    pub save_pct: f64,
    pub is_home: bool,
    pub rest_advantage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Int(i64),
    Float(f64),
    Date(NaiveDateTime),
    Missing,
}

impl Cell {
    fn float(v: f64) -> Self {
        if v.is_finite() { Cell::Float(v) } else { Cell::Missing }
    }

    fn opt_float(v: Option<f64>) -> Self {
        v.map_or(Cell::Missing, Cell::float)
    }

    fn flag(v: bool) -> Self {
        Cell::Int(i64::from(v))
    }

    pub fn render(&self, dates_only: bool) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Int(n) => n.to_string(),
            // Debug keeps a trailing ".0" on integral floats and round-trips exactly.
            Cell::Float(v) => format!("{v:?}"),
            Cell::Date(d) if dates_only => d.format("%Y-%m-%d").to_string(),
            Cell::Date(d) => d.format("%Y-%m-%d %H:%M:%S").to_string(),
            Cell::Missing => String::new(),
        }
    }
}

impl FeatureRow {
    /// Column names and values in output order: construction order, then `won` first.
    pub fn columns(&self) -> Vec<(String, Cell)> {
        let g = &self.game;
        let t = &self.temporal;
        let o = &self.opponent;
        let mut cols: Vec<(String, Cell)> = vec![
            ("game_id".into(), Cell::Text(g.game_id.clone())),
            ("date".into(), Cell::Date(g.date)),
            ("season".into(), Cell::Int(i64::from(g.season))),
            ("venue".into(), Cell::Text(g.venue.clone())),
            ("attendance".into(), Cell::float(g.attendance)),
            ("officials".into(), Cell::Text(g.officials.clone())),
            ("season_series".into(), Cell::Text(g.season_series.clone())),
            ("spread".into(), Cell::opt_float(g.spread)),
            ("over_under".into(), Cell::float(g.over_under)),
            ("favorite_moneyline".into(), Cell::float(g.favorite_moneyline)),
            ("team_id".into(), Cell::Text(g.team_id.clone())),
            ("team_name".into(), Cell::Text(g.team_name.clone())),
            ("home_away".into(), Cell::Text(g.home_away.clone())),
            ("team_record".into(), Cell::Text(g.team_record.clone())),
            ("won".into(), Cell::flag(g.won)),
        ];
        for stat in TrackedStat::ALL {
            cols.push((stat.column().into(), Cell::float(g.stat(stat))));
        }

        cols.push(("cum_wins".into(), Cell::float(t.cum_wins)));
        cols.push(("cum_games".into(), Cell::Int(t.cum_games as i64)));
        cols.push(("season_win_pct".into(), Cell::float(t.season_win_pct)));
        cols.push(("rest_days".into(), Cell::float(t.rest_days)));
        for rolling in &t.rolling {
            let w = rolling.window;
            for stat in TrackedStat::ALL {
                cols.push((
                    format!("rolling_{}_{w}", stat.column()),
                    Cell::opt_float(rolling.mean(stat)),
                ));
            }
            cols.push((
                format!("rolling_pp_efficiency_{w}"),
                Cell::opt_float(rolling.pp_efficiency),
            ));
        }

        cols.push(("opp_team_id".into(), Cell::Text(o.team_id.clone())));
        cols.push(("opp_team_name".into(), Cell::Text(o.team_name.clone())));
        cols.push(("opp_won".into(), Cell::flag(o.won)));
        cols.push(("opp_rest_days".into(), Cell::float(o.rest_days)));
        cols.push(("opp_season_win_pct".into(), Cell::float(o.season_win_pct)));
        cols.push(("opp_score".into(), Cell::float(o.score)));
        cols.push(("opp_shots".into(), Cell::float(o.shots)));
        for stat in TrackedStat::ALL {
            for rolling in &o.rolling {
                cols.push((
                    format!("opp_rolling_{}_{}", stat.column(), rolling.window),
                    Cell::opt_float(rolling.mean(stat)),
                ));
            }
        }
        for rolling in &o.rolling {
            cols.push((
                format!("opp_rolling_pp_efficiency_{}", rolling.window),
                Cell::opt_float(rolling.pp_efficiency),
            ));
        }

        cols.push(("save_pct".into(), Cell::float(self.save_pct)));
        cols.push(("is_home".into(), Cell::flag(self.is_home)));
        cols.push(("rest_advantage".into(), Cell::float(self.rest_advantage)));

        if let Some(pos) = cols.iter().position(|(name, _)| name == "won") {
            let won = cols.remove(pos);
            cols.insert(0, won);
        }
        cols
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeatureTable {
    pub rows: Vec<FeatureRow>,
    pub thresholds: ClipThresholds,
}

/// Run clipping, temporal state, opponent join and derived metrics over flattened rows.
pub fn build_feature_table(mut rows: Vec<TeamGameRow>, cfg: &PipelineConfig) -> FeatureTable {
    rows.sort_by(|a, b| {
        a.team_id
            .cmp(&b.team_id)
            .then(a.season.cmp(&b.season))
            .then(a.date.cmp(&b.date))
            .then_with(|| a.game_id.cmp(&b.game_id))
    });

    let thresholds = clip_outliers(&mut rows, cfg.outlier_quantile);
    for stat in TrackedStat::ALL {
        if let Some(limit) = thresholds.get(stat) {
            tracing::debug!(stat = stat.column(), limit, "outlier clip threshold");
        }
    }

    let temporal = build_temporal_features(&rows, cfg);
    let opponents = join_opponents(&rows);
    let mirrors: Vec<OpponentMirror> = rows
        .iter()
        .zip(&temporal)
        .map(|(row, feats)| OpponentMirror::from_side(row, feats))
        .collect();

    let mut out = Vec::with_capacity(rows.len());
    for ((game, temporal), opponent) in rows.into_iter().zip(temporal).zip(opponents) {
        let Some(opp_idx) = opponent else {
            continue;
        };
        let opponent = mirrors[opp_idx].clone();
        out.push(FeatureRow {
            save_pct: derived::save_pct(opponent.shots, opponent.score, cfg.neutral_save_pct),
            is_home: derived::is_home(&game.home_away),
            rest_advantage: derived::rest_advantage(temporal.rest_days, opponent.rest_days),
            game,
            temporal,
            opponent,
        });
    }

    FeatureTable {
        rows: out,
        thresholds,
    }
}

impl FeatureTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn headers(&self) -> Vec<String> {
        self.rows
            .first()
            .map(|row| row.columns().into_iter().map(|(name, _)| name).collect())
            .unwrap_or_default()
    }

    fn dates_only(&self) -> bool {
        self.rows.iter().all(|row| {
            row.game.date.num_seconds_from_midnight() == 0 && row.game.date.nanosecond() == 0
        })
    }

    /// Header row followed by one rendered record per feature row.
    pub fn records(&self) -> Vec<Vec<String>> {
        let dates_only = self.dates_only();
        let mut out = Vec::with_capacity(self.rows.len() + 1);
        out.push(self.headers());
        for row in &self.rows {
            out.push(
                row.columns()
                    .iter()
                    .map(|(_, cell)| cell.render(dates_only))
                    .collect(),
            );
        }
        out
    }

    /// Write as CSV, or as a workbook when the path ends in `.xlsx`.
    pub fn write(&self, path: &Path) -> Result<()> {
        let is_xlsx = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"));
        if is_xlsx {
            self.write_xlsx(path)
        } else {
            self.write_csv(path)
        }
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        ensure_parent(path)?;
        let tmp = path.with_extension("csv.tmp");
        let written = self.write_csv_records(&tmp);
        finish_tmp(written, &tmp, path)
    }

    fn write_csv_records(&self, tmp: &Path) -> Result<()> {
        let mut wtr =
            csv::Writer::from_path(tmp).with_context(|| format!("create csv {}", tmp.display()))?;
        for record in self.records() {
            wtr.write_record(&record).context("write csv record")?;
        }
        wtr.flush().context("flush csv")?;
        Ok(())
    }

    pub fn write_xlsx(&self, path: &Path) -> Result<()> {
        ensure_parent(path)?;
        let dates_only = self.dates_only();
        let mut workbook = Workbook::new();
        {
            let sheet = workbook.add_worksheet();
            sheet.set_name("Features")?;
            for (col_idx, name) in self.headers().iter().enumerate() {
                sheet
                    .write_string(0, col_idx as u16, name)
                    .with_context(|| format!("write header {name}"))?;
            }
            for (row_idx, row) in self.rows.iter().enumerate() {
                write_cells(sheet, row_idx as u32 + 1, &row.columns(), dates_only)?;
            }
        }
        let tmp = path.with_extension("xlsx.tmp");
        let saved = workbook
            .save(&tmp)
            .with_context(|| format!("failed writing workbook to {}", tmp.display()));
        finish_tmp(saved, &tmp, path)
    }
}

/// Move a finished tmp file into place. The tmp file never outlives a failure.
fn finish_tmp(written: Result<()>, tmp: &Path, path: &Path) -> Result<()> {
    let moved = written.and_then(|()| {
        fs::rename(tmp, path).with_context(|| format!("move {} into place", path.display()))
    });
    if moved.is_err() {
        let _ = fs::remove_file(tmp);
    }
    moved
}

fn write_cells(
    sheet: &mut Worksheet,
    row_idx: u32,
    cells: &[(String, Cell)],
    dates_only: bool,
) -> Result<()> {
    for (col_idx, (_, cell)) in cells.iter().enumerate() {
        let col = col_idx as u16;
        match cell {
            Cell::Int(n) => sheet.write_number(row_idx, col, *n as f64).map(|_| ()),
            Cell::Float(v) => sheet.write_number(row_idx, col, *v).map(|_| ()),
            Cell::Missing => Ok(()),
            other => sheet
                .write_string(row_idx, col, other.render(dates_only))
                .map(|_| ()),
        }
        .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
    }
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create output directory {}", parent.display()))?;
    }
    Ok(())
}
