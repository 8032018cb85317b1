use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Columns of the persisted feature table, in file order.
pub const FEATURE_TABLE_COLUMNS: [&str; 11] = [
    "date",
    "close",
    "spot_last",
    "iv",
    "rv7",
    "rv30",
    "mom7",
    "mom30",
    "rsi14",
    "iv_minus_rv30",
    "target_next_ret",
];

/// Model inputs, in the order the forecast engine consumes them.
pub const MODEL_FEATURES: [&str; 7] = [
    "iv",
    "rv7",
    "rv30",
    "mom7",
    "mom30",
    "rsi14",
    "iv_minus_rv30",
];
pub const N_MODEL_FEATURES: usize = MODEL_FEATURES.len();

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub close: f64,
    pub spot_last: Option<f64>,
    pub iv: Option<f64>,
    pub rv7: Option<f64>,
    pub rv30: Option<f64>,
    pub mom7: Option<f64>,
    pub mom30: Option<f64>,
    pub rsi14: Option<f64>,
    pub iv_minus_rv30: Option<f64>,
    pub target_next_ret: Option<f64>,
}

impl FeatureRow {
    pub fn empty(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            close,
            spot_last: None,
            iv: None,
            rv7: None,
            rv30: None,
            mom7: None,
            mom30: None,
            rsi14: None,
            iv_minus_rv30: None,
            target_next_ret: None,
        }
    }

    pub fn model_features(&self) -> [Option<f64>; N_MODEL_FEATURES] {
        [
            self.iv,
            self.rv7,
            self.rv30,
            self.mom7,
            self.mom30,
            self.rsi14,
            self.iv_minus_rv30,
        ]
        .map(|v| v.filter(|x| x.is_finite()))
    }

    pub fn realized_target(&self) -> Option<f64> {
        self.target_next_ret.filter(|v| v.is_finite())
    }
}
