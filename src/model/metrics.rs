use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
    Ok,
    NoOverlap,
    NoData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub n: usize,
    pub mae: f64,
    pub rmse: f64,
    pub bias: f64,
    pub hit_rate: f64,
    pub brier: Option<f64>,
    pub last_eval_date: NaiveDate,
}

/// Per-asset evaluation outcome. Metric fields are present only for `ok`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub symbol: String,
    pub status: EvaluationStatus,
    #[serde(flatten)]
    pub metrics: Option<EvaluationMetrics>,
}

impl EvaluationReport {
    pub fn without_metrics(symbol: &str, status: EvaluationStatus) -> Self {
        Self {
            symbol: symbol.to_string(),
            status,
            metrics: None,
        }
    }
}
