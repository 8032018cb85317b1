use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastStatus {
    Ok,
    InsufficientData,
    NoSourceData,
}

impl ForecastStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::InsufficientData => "insufficient_data",
            Self::NoSourceData => "no_source_data",
        }
    }
}

impl std::fmt::Display for ForecastStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    /// Date of the live row the forecast was made from.
    #[serde(default)]
    pub as_of_date: Option<NaiveDate>,
    /// Day the forecast targets, `YYYY-MM-DD`.
    #[serde(default)]
    pub for_date: Option<String>,
    #[serde(default, alias = "next_day_return_pred")]
    pub predicted_return: Option<f64>,
    #[serde(default)]
    pub prob_up: Option<f64>,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub sample_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_train_rows: Option<usize>,
    #[serde(default)]
    pub cv_folds: usize,
    #[serde(default)]
    pub rmse: Option<f64>,
    #[serde(default)]
    pub auc: Option<f64>,
    pub status: ForecastStatus,
}

impl ForecastRecord {
    pub fn no_source_data(symbol: &str, model: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.to_string(),
            timestamp,
            as_of_date: None,
            for_date: None,
            predicted_return: None,
            prob_up: None,
            model: model.to_string(),
            sample_size: 0,
            min_train_rows: None,
            cv_folds: 0,
            rmse: None,
            auc: None,
            status: ForecastStatus::NoSourceData,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ForecastStatus::Ok
    }
}

/// Aggregate view written to `predictions.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastBatch {
    pub generated_at: DateTime<Utc>,
    pub assets: Vec<ForecastRecord>,
}
