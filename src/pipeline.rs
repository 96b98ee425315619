use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::config::PipelineConfig;
use crate::feature_table::{FeatureTable, build_feature_table};
use crate::flatten::flatten_games;
use crate::game_record::load_game_records;

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub output_path: PathBuf,
    pub files_seen: usize,
    pub files_skipped: usize,
    pub records_seen: usize,
    pub games_kept: usize,
    pub records_skipped: BTreeMap<&'static str, usize>,
    pub rows_written: usize,
}

/// Load, flatten and featurize the batch in `cfg.data_dir`.
///
/// Returns `Ok(None)` when nothing usable was found; no output file is written then.
pub fn build_from_dir(cfg: &PipelineConfig) -> Result<Option<(FeatureTable, RunSummary)>> {
    let batch = load_game_records(&cfg.data_dir)?;
    let (rows, flat) = flatten_games(&batch.records);
    tracing::info!(
        files = batch.files_seen,
        files_skipped = batch.files_skipped,
        records = flat.records_seen,
        games = flat.games_kept,
        records_skipped = flat.records_skipped(),
        "flattened game records"
    );
    for (reason, count) in &flat.skipped {
        tracing::info!(reason, count, "records skipped");
    }

    if rows.is_empty() {
        tracing::warn!(dir = %cfg.data_dir.display(), "no valid games found, no dataset written");
        return Ok(None);
    }

    let table = build_feature_table(rows, cfg);
    let summary = RunSummary {
        output_path: cfg.output_path.clone(),
        files_seen: batch.files_seen,
        files_skipped: batch.files_skipped,
        records_seen: flat.records_seen,
        games_kept: flat.games_kept,
        records_skipped: flat.skipped,
        rows_written: table.rows.len(),
    };
    Ok(Some((table, summary)))
}

pub fn run(cfg: &PipelineConfig) -> Result<Option<RunSummary>> {
    let mut cfg = cfg.clone();
    cfg.validate().context("invalid pipeline config")?;

    let Some((table, summary)) = build_from_dir(&cfg)? else {
        return Ok(None);
    };
    if table.is_empty() {
        tracing::warn!("feature table is empty, no dataset written");
        return Ok(None);
    }

    table.write(&cfg.output_path)?;
    tracing::info!(
        rows = summary.rows_written,
        columns = table.headers().len(),
        path = %cfg.output_path.display(),
        "wrote feature dataset"
    );
    Ok(Some(summary))
}
