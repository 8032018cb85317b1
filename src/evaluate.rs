use std::collections::HashMap;

use chrono::NaiveDate;

use crate::model::day::parse_date_key;
use crate::model::feature::FeatureRow;
use crate::model::forecast::ForecastRecord;
use crate::model::metrics::{EvaluationMetrics, EvaluationReport, EvaluationStatus};

#[derive(Debug, Clone, Copy, PartialEq)]
struct ForecastPair {
    date: NaiveDate,
    realized: f64,
    predicted: f64,
    prob_up: Option<f64>,
}

/// Matched forecast/outcome pairs for one asset.
#[derive(Debug, Clone, Default)]
pub struct ForecastPairs {
    pairs: Vec<ForecastPair>,
}

impl ForecastPairs {
    pub fn observe(
        &mut self,
        date: NaiveDate,
        realized: f64,
        predicted: f64,
        prob_up: Option<f64>,
    ) {
        if !realized.is_finite() || !predicted.is_finite() {
            return;
        }
        self.pairs.push(ForecastPair {
            date,
            realized,
            predicted,
            prob_up: prob_up.filter(|p| p.is_finite()),
        });
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    fn mean_of(&self, f: impl Fn(&ForecastPair) -> f64) -> Option<f64> {
        if self.pairs.is_empty() {
            return None;
        }
        Some(self.pairs.iter().map(f).sum::<f64>() / self.pairs.len() as f64)
    }

    pub fn mae(&self) -> Option<f64> {
        self.mean_of(|p| (p.predicted - p.realized).abs())
    }

    pub fn rmse(&self) -> Option<f64> {
        self.mean_of(|p| (p.predicted - p.realized).powi(2)).map(f64::sqrt)
    }

    pub fn bias(&self) -> Option<f64> {
        self.mean_of(|p| p.predicted - p.realized)
    }

    /// Share of pairs whose predicted and realized signs agree; zero is its
    /// own sign.
    pub fn hit_rate(&self) -> Option<f64> {
        self.mean_of(|p| {
            if sign(p.predicted) == sign(p.realized) {
                1.0
            } else {
                0.0
            }
        })
    }

    /// `None` when no pair carries a probability. Otherwise pairs without one
    /// take `fallback`, or are left out when `fallback` is `None`.
    pub fn brier(&self, fallback: Option<f64>) -> Option<f64> {
        if self.pairs.iter().all(|p| p.prob_up.is_none()) {
            return None;
        }
        let scores: Vec<f64> = self
            .pairs
            .iter()
            .filter_map(|p| {
                let prob = p.prob_up.or(fallback)?;
                let outcome = if p.realized > 0.0 { 1.0 } else { 0.0 };
                Some((prob - outcome).powi(2))
            })
            .collect();
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.pairs.iter().map(|p| p.date).max()
    }
}

fn sign(v: f64) -> i8 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

/// Scores logged forecasts against realized next-day returns.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator {
    prob_fallback: Option<f64>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self {
            prob_fallback: Some(0.5),
        }
    }
}

impl Evaluator {
    pub fn new(prob_fallback: Option<f64>) -> Self {
        Self { prob_fallback }
    }

    pub fn pairs(log: &[ForecastRecord], rows: &[FeatureRow]) -> ForecastPairs {
        let realized: HashMap<NaiveDate, f64> = rows
            .iter()
            .filter_map(|r| r.realized_target().map(|t| (r.date, t)))
            .collect();

        let mut pairs = ForecastPairs::default();
        for record in log {
            let Some(date) = record.for_date.as_deref().and_then(parse_date_key) else {
                continue;
            };
            let (Some(&y), Some(y_hat)) = (realized.get(&date), record.predicted_return) else {
                continue;
            };
            pairs.observe(date, y, y_hat, record.prob_up);
        }
        pairs
    }

    pub fn evaluate(
        &self,
        symbol: &str,
        log: &[ForecastRecord],
        rows: &[FeatureRow],
    ) -> EvaluationReport {
        if log.is_empty() || rows.is_empty() {
            tracing::info!(symbol, log_len = log.len(), rows = rows.len(), "nothing to evaluate");
            return EvaluationReport::without_metrics(symbol, EvaluationStatus::NoData);
        }

        let pairs = Self::pairs(log, rows);
        let metrics = match (
            pairs.mae(),
            pairs.rmse(),
            pairs.bias(),
            pairs.hit_rate(),
            pairs.last_date(),
        ) {
            (Some(mae), Some(rmse), Some(bias), Some(hit_rate), Some(last_eval_date)) => {
                EvaluationMetrics {
                    n: pairs.len(),
                    mae,
                    rmse,
                    bias,
                    hit_rate,
                    brier: pairs.brier(self.prob_fallback),
                    last_eval_date,
                }
            }
            _ => {
                tracing::info!(symbol, log_len = log.len(), "no forecast matches a realized day");
                return EvaluationReport::without_metrics(symbol, EvaluationStatus::NoOverlap);
            }
        };

        tracing::info!(
            symbol,
            n = metrics.n,
            mae = metrics.mae,
            hit_rate = metrics.hit_rate,
            brier = ?metrics.brier,
            "forecasts evaluated"
        );
        EvaluationReport {
            symbol: symbol.to_string(),
            status: EvaluationStatus::Ok,
            metrics: Some(metrics),
        }
    }
}
