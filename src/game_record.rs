use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;

#[derive(Debug, Clone, Default)]
pub struct RawBatch {
    pub files_seen: usize,
    pub files_skipped: usize,
    pub records: Vec<Value>,
}

/// Read every `*.json` file in `dir` (sorted by path) and collect the game records they hold.
///
/// Unreadable files, invalid JSON and files whose top level is not an array are skipped.
/// A missing directory produces an empty batch.
pub fn load_game_records(dir: &Path) -> Result<RawBatch> {
    let mut batch = RawBatch::default();
    if !dir.is_dir() {
        tracing::warn!(dir = %dir.display(), "data directory not found, nothing to load");
        return Ok(batch);
    }

    for path in list_json_files(dir)? {
        batch.files_seen += 1;
        match read_game_list(&path) {
            Ok(records) => {
                tracing::debug!(file = %path.display(), records = records.len(), "loaded game file");
                batch.records.extend(records);
            }
            Err(err) => {
                tracing::warn!(file = %path.display(), error = %format!("{err:#}"), "skipping game file");
                batch.files_skipped += 1;
            }
        }
    }

    Ok(batch)
}

fn list_json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("read data directory {}", dir.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let Ok(entry) = entry else {
            continue;
        };
        let path = entry.path();
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn read_game_list(path: &Path) -> Result<Vec<Value>> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("read game file {}", path.display()))?;
    parse_game_list(&raw)
}

pub fn parse_game_list(raw: &str) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_str(raw.trim()).context("invalid game list json")?;
    match value {
        Value::Array(records) => Ok(records),
        other => Err(anyhow::anyhow!(
            "top-level json is {} rather than a list",
            json_kind(&other)
        )),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// Numbers and numeric strings become `f64`; anything else becomes 0.0.
pub fn coerce_f64(v: Option<&Value>) -> f64 {
    optional_f64(v).unwrap_or(0.0)
}

/// Like [`coerce_f64`] but keeps "not a number" distinguishable from zero.
pub fn optional_f64(v: Option<&Value>) -> Option<f64> {
    let n = match v? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Identifiers show up both as strings and as bare numbers.
pub fn coerce_id(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn coerce_string(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coerce_f64_is_lenient() {
        assert_eq!(coerce_f64(Some(&json!(31))), 31.0);
        assert_eq!(coerce_f64(Some(&json!("52.4"))), 52.4);
        assert_eq!(coerce_f64(Some(&json!(" 7 "))), 7.0);
        assert_eq!(coerce_f64(Some(&json!("n/a"))), 0.0);
        assert_eq!(coerce_f64(Some(&json!(null))), 0.0);
        assert_eq!(coerce_f64(Some(&json!([1, 2]))), 0.0);
        assert_eq!(coerce_f64(None), 0.0);
    }

    #[test]
    fn optional_f64_rejects_non_finite_strings() {
        assert_eq!(optional_f64(Some(&json!("inf"))), None);
        assert_eq!(optional_f64(Some(&json!("NaN"))), None);
        assert_eq!(optional_f64(Some(&json!("-1.5"))), Some(-1.5));
    }

    #[test]
    fn coerce_id_accepts_numbers() {
        assert_eq!(coerce_id(Some(&json!(12))).as_deref(), Some("12"));
        assert_eq!(coerce_id(Some(&json!(" TOR "))).as_deref(), Some("TOR"));
        assert_eq!(coerce_id(Some(&json!(""))), None);
        assert_eq!(coerce_id(Some(&json!({}))), None);
    }

    #[test]
    fn parse_game_list_requires_array() {
        assert_eq!(parse_game_list("[]").expect("empty list parses").len(), 0);
        assert!(parse_game_list(r#"{"game_id": "G1"}"#).is_err());
        assert!(parse_game_list("not json").is_err());
    }
}
