use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AppError;
use crate::model::day::parse_utc_timestamp;
use crate::model::vol::VolObservation;

use super::VolSource;

pub const VOL_FEED_FILE: &str = "cvi_timeseries.json";

/// Reads `{docs}/{SYM}/cvi_timeseries.json`. A missing or unreadable feed is
/// an empty history, never an error.
pub struct FileVolFeed {
    docs_dir: PathBuf,
}

impl FileVolFeed {
    pub fn new(docs_dir: impl Into<PathBuf>) -> Self {
        Self {
            docs_dir: docs_dir.into(),
        }
    }

    pub fn feed_path(&self, symbol: &str) -> PathBuf {
        self.docs_dir
            .join(symbol.trim().to_ascii_uppercase())
            .join(VOL_FEED_FILE)
    }
}

/// Parses the feed array; entries that are not objects are skipped.
pub fn parse_vol_feed(raw: &str, path: &Path) -> Vec<VolObservation> {
    let value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "IV feed is not valid JSON");
            return Vec::new();
        }
    };
    let Value::Array(items) = value else {
        tracing::warn!(path = %path.display(), "IV feed is not a JSON array");
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let obj = item.as_object()?;
            Some(VolObservation {
                timestamp: obj.get("t").and_then(parse_utc_timestamp),
                spot: obj.get("spot").and_then(number),
                iv_atm: obj.get("atm_iv").and_then(number),
                iv_vega: obj.get("vega_weighted_iv").and_then(number),
            })
        })
        .collect()
}

fn number(v: &Value) -> Option<f64> {
    let parsed = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|x| x.is_finite())
}

#[async_trait]
impl VolSource for FileVolFeed {
    fn name(&self) -> &str {
        "cvi-file"
    }

    async fn vol_history(&self, symbol: &str) -> Result<Vec<VolObservation>, AppError> {
        let path = self.feed_path(symbol);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(symbol, path = %path.display(), error = %e, "IV feed unavailable");
                return Ok(Vec::new());
            }
        };
        let observations = parse_vol_feed(&raw, &path);
        tracing::info!(symbol, count = observations.len(), "IV feed loaded");
        Ok(observations)
    }
}
