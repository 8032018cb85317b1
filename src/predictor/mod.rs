pub mod gbm;
pub mod walk_forward;

use chrono::{DateTime, Utc};

use crate::config::ForecastConfig;
use crate::model::day::format_date_key;
use crate::model::feature::{FeatureRow, MODEL_FEATURES, N_MODEL_FEATURES};
use crate::model::forecast::{ForecastRecord, ForecastStatus};

use gbm::{GbmParams, GradientBoostedClassifier, GradientBoostedRegressor};
use walk_forward::{cross_validate, fold_count};

pub type FeatureVector = [f64; N_MODEL_FEATURES];

/// Fits a return regressor and an up/down classifier on one asset's feature
/// table and scores its live row.
#[derive(Debug, Clone)]
pub struct ForecastEngine {
    cfg: ForecastConfig,
    params: GbmParams,
    model_id: String,
}

impl ForecastEngine {
    pub fn new(cfg: ForecastConfig) -> Self {
        Self {
            params: GbmParams::from(&cfg),
            model_id: cfg.model_id(),
            cfg,
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn forecast(&self, symbol: &str, rows: &[FeatureRow]) -> ForecastRecord {
        self.forecast_at(symbol, rows, Utc::now())
    }

    /// `rows` must be date-ordered; the last row is the live row.
    pub fn forecast_at(
        &self,
        symbol: &str,
        rows: &[FeatureRow],
        now: DateTime<Utc>,
    ) -> ForecastRecord {
        let mut record = ForecastRecord {
            symbol: symbol.to_string(),
            timestamp: now,
            as_of_date: None,
            for_date: None,
            predicted_return: None,
            prob_up: None,
            model: self.model_id.clone(),
            sample_size: 0,
            min_train_rows: Some(self.cfg.min_train_rows),
            cv_folds: 0,
            rmse: None,
            auc: None,
            status: ForecastStatus::InsufficientData,
        };

        let Some((live, history)) = rows.split_last() else {
            tracing::info!(symbol, "empty feature table");
            return record;
        };
        record.as_of_date = Some(live.date);
        record.for_date = live.date.succ_opt().map(format_date_key);

        let (train_idx, y): (Vec<usize>, Vec<f64>) = history
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.realized_target().map(|t| (i, t)))
            .unzip();
        record.sample_size = train_idx.len();

        if train_idx.len() < self.cfg.min_train_rows {
            tracing::info!(
                symbol,
                sample_size = train_idx.len(),
                min_train_rows = self.cfg.min_train_rows,
                "not enough labelled rows to fit"
            );
            return record;
        }
        let live_missing: Vec<&str> = MODEL_FEATURES
            .iter()
            .zip(live.model_features())
            .filter(|(_, v)| v.is_none())
            .map(|(name, _)| *name)
            .collect();
        if live_missing.len() == N_MODEL_FEATURES {
            tracing::warn!(symbol, date = %live.date, "live row has no usable features");
            return record;
        }
        if !live_missing.is_empty() {
            tracing::debug!(
                symbol,
                filled = ?live_missing,
                "live row features filled from history"
            );
        }

        let matrix = filled_feature_matrix(rows);
        let x: Vec<FeatureVector> = train_idx.iter().map(|&i| matrix[i]).collect();
        let labels: Vec<bool> = y.iter().map(|&v| v > 0.0).collect();
        let live_x = &matrix[rows.len() - 1];

        let n_folds = fold_count(x.len(), self.cfg.max_cv_folds);
        let cv = cross_validate(&x, &y, &labels, n_folds, &self.params);

        let regressor = GradientBoostedRegressor::fit(&x, &y, &self.params);
        let classifier = GradientBoostedClassifier::fit(&x, &labels, &self.params);
        if classifier.is_degenerate() {
            tracing::warn!(symbol, "training labels are a single class");
        }

        record.predicted_return = Some(regressor.predict(live_x)).filter(|v| v.is_finite());
        record.prob_up = Some(classifier.predict_proba(live_x).clamp(0.0, 1.0));
        record.cv_folds = cv.n_folds;
        record.rmse = cv.rmse;
        record.auc = if classifier.is_degenerate() { None } else { cv.auc };
        record.min_train_rows = None;
        record.status = ForecastStatus::Ok;

        tracing::info!(
            symbol,
            sample_size = record.sample_size,
            cv_folds = cv.n_folds,
            rmse = ?record.rmse,
            auc = ?record.auc,
            predicted_return = ?record.predicted_return,
            prob_up = ?record.prob_up,
            "forecast fitted"
        );
        record
    }
}

/// Model features with gaps forward-filled, then back-filled. A column with
/// no observations at all becomes zero.
pub fn filled_feature_matrix(rows: &[FeatureRow]) -> Vec<FeatureVector> {
    let raw: Vec<[Option<f64>; N_MODEL_FEATURES]> =
        rows.iter().map(FeatureRow::model_features).collect();
    let mut out = vec![[0.0; N_MODEL_FEATURES]; rows.len()];
    for f in 0..N_MODEL_FEATURES {
        // leading gaps take the first observed value
        let mut last = raw.iter().find_map(|r| r[f]);
        for (i, r) in raw.iter().enumerate() {
            if let Some(v) = r[f] {
                last = Some(v);
            }
            out[i][f] = last.unwrap_or(0.0);
        }
    }
    out
}
