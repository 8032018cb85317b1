//! On-disk layout of every artifact the pipeline reads or writes.
//!
//! ```text
//! {data}/{SYM}_features.csv
//! {docs}/{SYM}/forecast.json
//! {docs}/{SYM}/forecast_log.json
//! {docs}/{SYM}/forecast_metrics.json
//! {docs}/predictions.json
//! {docs}/forecast_metrics.json
//! ```
//!
//! Every write lands in a sibling temp file first and is renamed into place.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::config::StorageConfig;
use crate::error::AppError;
use crate::model::day::parse_date_key;
use crate::model::feature::{FeatureRow, FEATURE_TABLE_COLUMNS};
use crate::model::forecast::{ForecastBatch, ForecastRecord};
use crate::model::metrics::EvaluationReport;

pub const FORECAST_FILE: &str = "forecast.json";
pub const FORECAST_LOG_FILE: &str = "forecast_log.json";
pub const METRICS_FILE: &str = "forecast_metrics.json";
pub const PREDICTIONS_FILE: &str = "predictions.json";

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    data_dir: PathBuf,
    docs_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(data_dir: impl Into<PathBuf>, docs_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            docs_dir: docs_dir.into(),
        }
    }

    pub fn from_config(storage: &StorageConfig) -> Self {
        Self::new(&storage.data_dir, &storage.docs_dir)
    }

    pub fn features_path(&self, symbol: &str) -> PathBuf {
        self.data_dir.join(format!("{}_features.csv", symbol_key(symbol)))
    }

    pub fn asset_docs_dir(&self, symbol: &str) -> PathBuf {
        self.docs_dir.join(symbol_key(symbol))
    }

    pub fn forecast_path(&self, symbol: &str) -> PathBuf {
        self.asset_docs_dir(symbol).join(FORECAST_FILE)
    }

    pub fn forecast_log_path(&self, symbol: &str) -> PathBuf {
        self.asset_docs_dir(symbol).join(FORECAST_LOG_FILE)
    }

    pub fn metrics_path(&self, symbol: &str) -> PathBuf {
        self.asset_docs_dir(symbol).join(METRICS_FILE)
    }

    pub fn predictions_path(&self) -> PathBuf {
        self.docs_dir.join(PREDICTIONS_FILE)
    }

    pub fn metrics_aggregate_path(&self) -> PathBuf {
        self.docs_dir.join(METRICS_FILE)
    }

    pub fn write_features(&self, symbol: &str, rows: &[FeatureRow]) -> Result<PathBuf, AppError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        if rows.is_empty() {
            writer.write_record(FEATURE_TABLE_COLUMNS)?;
        }
        for row in rows {
            writer.serialize(row)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| AppError::Io(e.into_error()))?;
        let path = self.features_path(symbol);
        write_atomic(&path, &bytes)?;
        Ok(path)
    }

    /// `Ok(None)` when no table has been written yet. Columns are matched by
    /// header name; a missing column reads as nulls and unparsable cells as
    /// null. Rows without a valid date and close are skipped.
    pub fn load_features(&self, symbol: &str) -> Result<Option<Vec<FeatureRow>>, AppError> {
        let path = self.features_path(symbol);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AppError::Io(e)),
        };
        read_feature_csv(symbol, &raw).map(Some)
    }

    pub fn write_forecast(&self, record: &ForecastRecord) -> Result<PathBuf, AppError> {
        let path = self.forecast_path(&record.symbol);
        write_json(&path, record)?;
        Ok(path)
    }

    pub fn load_forecast(&self, symbol: &str) -> Result<Option<ForecastRecord>, AppError> {
        let path = self.forecast_path(symbol);
        match std::fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Entries that do not parse as forecast records are skipped; an
    /// unreadable log is empty.
    pub fn load_forecast_log(&self, symbol: &str) -> Vec<ForecastRecord> {
        let entries = self.read_log_entries(symbol);
        let total = entries.len();
        let records: Vec<ForecastRecord> = entries
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();
        if records.len() < total {
            tracing::warn!(
                symbol,
                skipped = total - records.len(),
                "malformed forecast log entries skipped"
            );
        }
        records
    }

    /// Appends `record` to the asset's log and returns the new entry count.
    /// Existing entries are carried over untouched, malformed ones included.
    pub fn append_forecast_log(&self, record: &ForecastRecord) -> Result<usize, AppError> {
        let mut entries = self.read_log_entries(&record.symbol);
        entries.push(serde_json::to_value(record)?);
        write_json(&self.forecast_log_path(&record.symbol), &entries)?;
        Ok(entries.len())
    }

    pub fn write_predictions(&self, batch: &ForecastBatch) -> Result<PathBuf, AppError> {
        let path = self.predictions_path();
        write_json(&path, batch)?;
        Ok(path)
    }

    pub fn write_metrics(&self, report: &EvaluationReport) -> Result<PathBuf, AppError> {
        let path = self.metrics_path(&report.symbol);
        write_json(&path, report)?;
        Ok(path)
    }

    pub fn write_metrics_aggregate(
        &self,
        reports: &[EvaluationReport],
    ) -> Result<PathBuf, AppError> {
        let path = self.metrics_aggregate_path();
        write_json(&path, &reports)?;
        Ok(path)
    }

    fn read_log_entries(&self, symbol: &str) -> Vec<Value> {
        let path = self.forecast_log_path(symbol);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!(
                    symbol,
                    path = %path.display(),
                    error = %e,
                    "forecast log unreadable"
                );
                return Vec::new();
            }
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(entries)) => entries,
            Ok(_) => {
                tracing::warn!(symbol, path = %path.display(), "forecast log is not a JSON array");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(
                    symbol,
                    path = %path.display(),
                    error = %e,
                    "forecast log is not valid JSON"
                );
                Vec::new()
            }
        }
    }
}

fn symbol_key(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}

fn read_feature_csv(symbol: &str, raw: &str) -> Result<Vec<FeatureRow>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(raw.as_bytes());
    let index: HashMap<String, usize> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, name)| (name.to_string(), i))
        .collect();

    let missing: Vec<&str> = FEATURE_TABLE_COLUMNS
        .iter()
        .copied()
        .filter(|c| !index.contains_key(*c))
        .collect();
    if !missing.is_empty() {
        tracing::warn!(
            symbol,
            missing = ?missing,
            "feature table is missing columns, reading them as null"
        );
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let cell = |name: &str| index.get(name).and_then(|&i| record.get(i));
        let num = |name: &str| {
            cell(name)
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|v| v.is_finite())
        };
        let (Some(date), Some(close)) = (cell("date").and_then(parse_date_key), num("close")) else {
            tracing::debug!(symbol, "feature row without date or close skipped");
            continue;
        };
        rows.push(FeatureRow {
            date,
            close,
            spot_last: num("spot_last"),
            iv: num("iv"),
            rv7: num("rv7"),
            rv30: num("rv30"),
            mom7: num("mom7"),
            mom30: num("mom30"),
            rsi14: num("rsi14"),
            iv_minus_rv30: num("iv_minus_rv30"),
            target_next_ret: num("target_next_ret"),
        });
    }
    Ok(rows)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(value)?;
    write_atomic(path, json.as_bytes())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), AppError> {
    let persistence = |source: std::io::Error| AppError::Persistence {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(persistence)?;
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    std::fs::write(&tmp, bytes).map_err(persistence)?;
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        persistence(e)
    })
}
