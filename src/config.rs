use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_OUTPUT_PATH: &str = "nhl_dataset.csv";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub output_path: PathBuf,
    pub default_rest_days: f64,
    pub max_rest_days: f64,
    pub outlier_quantile: f64,
    pub rolling_windows: Vec<usize>,
    /// Season win percentage before a team has played any game that season.
    pub neutral_season_win_pct: f64,
    /// Save percentage when the opponent recorded no shots.
    pub neutral_save_pct: f64,
    pub pp_efficiency_epsilon: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            default_rest_days: 3.0,
            max_rest_days: 7.0,
            outlier_quantile: 0.99,
            rolling_windows: vec![3, 10],
            neutral_season_win_pct: 0.45,
            neutral_save_pct: 0.91,
            pp_efficiency_epsilon: 1e-6,
        }
    }
}

impl PipelineConfig {
    /// Read overrides from a JSON file; absent fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read pipeline config {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parse pipeline config {}", path.display()))
    }

    pub fn apply_env(&mut self) {
        self.apply_vars(env_non_empty);
    }

    /// Overrides from `NHL_*` variables; values that do not parse are ignored.
    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = var("NHL_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(out) = var("NHL_DATASET_OUT") {
            self.output_path = PathBuf::from(out);
        }
        if let Some(raw) = var("NHL_ROLLING_WINDOWS") {
            let windows = parse_windows(&raw);
            if !windows.is_empty() {
                self.rolling_windows = windows;
            }
        }
        if let Some(q) = var("NHL_OUTLIER_QUANTILE").and_then(|v| v.trim().parse::<f64>().ok()) {
            self.outlier_quantile = q;
        }
    }

    /// Check bounds and normalise the window list (sorted, deduplicated).
    pub fn validate(&mut self) -> Result<()> {
        if self.rolling_windows.is_empty() {
            return Err(anyhow!("at least one rolling window is required"));
        }
        if self.rolling_windows.contains(&0) {
            return Err(anyhow!("rolling windows must be at least one game"));
        }
        self.rolling_windows.sort_unstable();
        self.rolling_windows.dedup();

        if !(self.outlier_quantile > 0.0 && self.outlier_quantile <= 1.0) {
            return Err(anyhow!(
                "outlier quantile must be in (0, 1], got {}",
                self.outlier_quantile
            ));
        }
        if self.default_rest_days < 0.0 || self.max_rest_days < 0.0 {
            return Err(anyhow!("rest day bounds must be non-negative"));
        }
        if self.default_rest_days > self.max_rest_days {
            return Err(anyhow!(
                "default rest days ({}) exceed the cap ({})",
                self.default_rest_days,
                self.max_rest_days
            ));
        }
        if !(self.pp_efficiency_epsilon > 0.0) {
            return Err(anyhow!("power-play epsilon must be positive"));
        }
        Ok(())
    }

    pub fn max_window(&self) -> usize {
        self.rolling_windows.iter().copied().max().unwrap_or(0)
    }
}

/// Build the configuration from defaults, an optional `--config` file, the environment and
/// finally CLI flags, in increasing precedence.
pub fn resolve_from_args(args: &[String]) -> Result<PipelineConfig> {
    resolve_with(args, env_non_empty)
}

fn resolve_with(args: &[String], var: impl Fn(&str) -> Option<String>) -> Result<PipelineConfig> {
    let mut cfg = match flag_value(args, "--config") {
        Some(path) => PipelineConfig::load(Path::new(&path))?,
        None => PipelineConfig::default(),
    };
    cfg.apply_vars(var);
    if let Some(dir) = flag_value(args, "--data-dir") {
        cfg.data_dir = PathBuf::from(dir);
    }
    if let Some(out) = flag_value(args, "--out") {
        cfg.output_path = PathBuf::from(out);
    }
    cfg.validate()?;
    Ok(cfg)
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == flag {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(next.trim().to_string());
            }
        }
    }
    None
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_windows(raw: &str) -> Vec<usize> {
    raw.split([',', ';', ' '])
        .filter_map(|part| part.trim().parse::<usize>().ok())
        .collect()
}
