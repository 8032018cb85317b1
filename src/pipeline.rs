use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::error::AppError;
use crate::evaluate::Evaluator;
use crate::features::FeatureBuilder;
use crate::merge::SeriesMerger;
use crate::model::forecast::{ForecastBatch, ForecastRecord};
use crate::model::metrics::EvaluationReport;
use crate::model::price::PriceSeries;
use crate::model::vol::VolSeries;
use crate::predictor::ForecastEngine;
use crate::provider::{CoinGeckoClient, FileVolFeed, PriceSource, VolSource};
use crate::store::ArtifactStore;

#[derive(Debug, Clone, PartialEq)]
pub struct BackfillSummary {
    pub symbol: String,
    pub price_days: usize,
    pub iv_days: usize,
    pub rows: usize,
    pub path: Option<PathBuf>,
    pub error: Option<String>,
    pub source_unavailable: bool,
}

impl BackfillSummary {
    fn failed(symbol: &str, err: &AppError) -> Self {
        Self {
            symbol: symbol.to_string(),
            price_days: 0,
            iv_days: 0,
            rows: 0,
            path: None,
            error: Some(err.to_string()),
            source_unavailable: err.is_source_unavailable(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub backfill: Vec<BackfillSummary>,
    pub forecasts: ForecastBatch,
    pub metrics: Vec<EvaluationReport>,
}

/// Per-asset backfill, forecast and evaluation stages. Assets run as
/// independent tasks; results are collected in configured symbol order.
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<Config>,
    prices: Arc<dyn PriceSource>,
    vols: Arc<dyn VolSource>,
    store: Arc<ArtifactStore>,
    engine: ForecastEngine,
    evaluator: Evaluator,
}

impl Pipeline {
    pub fn new(
        config: Config,
        prices: Arc<dyn PriceSource>,
        vols: Arc<dyn VolSource>,
        store: ArtifactStore,
    ) -> Self {
        Self {
            engine: ForecastEngine::new(config.forecast),
            evaluator: Evaluator::new(config.evaluation.prob_fallback()),
            config: Arc::new(config),
            prices,
            vols,
            store: Arc::new(store),
        }
    }

    /// CoinGecko prices, the file IV feed and the configured storage roots.
    pub fn from_config(config: Config) -> Result<Self, AppError> {
        let prices = CoinGeckoClient::new(&config.provider, &config.assets)?;
        let vols = FileVolFeed::new(&config.storage.docs_dir);
        let store = ArtifactStore::from_config(&config.storage);
        Ok(Self::new(config, Arc::new(prices), Arc::new(vols), store))
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn symbols(&self) -> Vec<String> {
        self.config.assets.tradable_symbols()
    }

    async fn for_each_asset<T, F, Fut>(&self, f: F) -> Vec<(String, Result<T, AppError>)>
    where
        F: Fn(Pipeline, String) -> Fut,
        Fut: Future<Output = Result<T, AppError>> + Send + 'static,
        T: Send + 'static,
    {
        let handles: Vec<_> = self
            .symbols()
            .into_iter()
            .map(|sym| {
                let handle = tokio::spawn(f(self.clone(), sym.clone()));
                (sym, handle)
            })
            .collect();

        let mut out = Vec::with_capacity(handles.len());
        for (sym, handle) in handles {
            let result = match handle.await {
                Ok(r) => r,
                Err(e) => Err(AppError::from(e)),
            };
            out.push((sym, result));
        }
        out
    }

    pub async fn backfill_asset(&self, symbol: &str) -> Result<BackfillSummary, AppError> {
        let price_obs = self.prices.price_history(symbol).await?;
        let vol_obs = match self.vols.vol_history(symbol).await {
            Ok(obs) => obs,
            Err(e) => {
                tracing::warn!(
                    symbol,
                    source = self.vols.name(),
                    error = %e,
                    "IV source failed, continuing without IV"
                );
                Vec::new()
            }
        };

        let store = self.store.clone();
        let sym = symbol.to_string();
        tokio::task::spawn_blocking(move || -> Result<BackfillSummary, AppError> {
            let prices = PriceSeries::from_observations(&price_obs);
            let vols = VolSeries::from_observations(&vol_obs);
            let merged = SeriesMerger::merge(&prices, &vols);
            let rows = FeatureBuilder::build(&merged);
            let path = store.write_features(&sym, &rows)?;
            tracing::info!(
                symbol = %sym,
                price_days = prices.len(),
                iv_days = vols.len(),
                rows = rows.len(),
                path = %path.display(),
                "feature table written"
            );
            Ok(BackfillSummary {
                symbol: sym,
                price_days: prices.len(),
                iv_days: vols.len(),
                rows: rows.len(),
                path: Some(path),
                error: None,
                source_unavailable: false,
            })
        })
        .await?
    }

    pub async fn backfill_all(&self) -> Vec<BackfillSummary> {
        self.for_each_asset(|p, sym| async move { p.backfill_asset(&sym).await })
            .await
            .into_iter()
            .map(|(sym, result)| {
                result.unwrap_or_else(|e| {
                    tracing::error!(symbol = %sym, error = %e, "backfill failed");
                    BackfillSummary::failed(&sym, &e)
                })
            })
            .collect()
    }

    /// Forecasts one asset from its stored feature table, then writes the
    /// record and appends it to the asset's log.
    pub async fn forecast_asset(
        &self,
        symbol: &str,
        now: DateTime<Utc>,
        source_failed: bool,
    ) -> Result<ForecastRecord, AppError> {
        let this = self.clone();
        let sym = symbol.to_string();
        tokio::task::spawn_blocking(move || -> Result<ForecastRecord, AppError> {
            let record = if source_failed {
                ForecastRecord::no_source_data(&sym, this.engine.model_id(), now)
            } else {
                match this.store.load_features(&sym) {
                    Ok(Some(rows)) => this.engine.forecast_at(&sym, &rows, now),
                    Ok(None) => {
                        tracing::warn!(symbol = %sym, "no feature table on disk");
                        ForecastRecord::no_source_data(&sym, this.engine.model_id(), now)
                    }
                    Err(e) => {
                        tracing::warn!(symbol = %sym, error = %e, "feature table unreadable");
                        ForecastRecord::no_source_data(&sym, this.engine.model_id(), now)
                    }
                }
            };
            // nothing is written for the asset unless the log append succeeds
            let log_len = this.store.append_forecast_log(&record)?;
            this.store.write_forecast(&record)?;
            tracing::info!(symbol = %sym, status = %record.status, log_len, "forecast recorded");
            Ok(record)
        })
        .await?
    }

    pub async fn forecast_all(&self) -> Result<ForecastBatch> {
        self.forecast_all_except(&HashSet::new()).await
    }

    /// Symbols in `source_failed` get a `no_source_data` record without
    /// touching their feature table.
    pub async fn forecast_all_except(
        &self,
        source_failed: &HashSet<String>,
    ) -> Result<ForecastBatch> {
        let now = Utc::now();
        let failed = Arc::new(source_failed.clone());
        let results = self
            .for_each_asset(move |p, sym| {
                let skip = failed.contains(&sym);
                async move { p.forecast_asset(&sym, now, skip).await }
            })
            .await;

        let mut assets = Vec::with_capacity(results.len());
        for (sym, result) in results {
            match result {
                Ok(record) => assets.push(record),
                Err(e) => tracing::error!(symbol = %sym, error = %e, "forecast not persisted"),
            }
        }
        let batch = ForecastBatch {
            generated_at: now,
            assets,
        };
        let path = self
            .store
            .write_predictions(&batch)
            .context("failed to write aggregate predictions")?;
        tracing::info!(path = %path.display(), assets = batch.assets.len(), "predictions written");
        Ok(batch)
    }

    pub async fn evaluate_asset(&self, symbol: &str) -> Result<EvaluationReport, AppError> {
        let this = self.clone();
        let sym = symbol.to_string();
        tokio::task::spawn_blocking(move || -> Result<EvaluationReport, AppError> {
            let log = this.store.load_forecast_log(&sym);
            let rows = match this.store.load_features(&sym) {
                Ok(rows) => rows.unwrap_or_default(),
                Err(e) => {
                    tracing::warn!(symbol = %sym, error = %e, "feature table unreadable");
                    Vec::new()
                }
            };
            let report = this.evaluator.evaluate(&sym, &log, &rows);
            this.store.write_metrics(&report)?;
            Ok(report)
        })
        .await?
    }

    pub async fn evaluate_all(&self) -> Result<Vec<EvaluationReport>> {
        let results = self
            .for_each_asset(|p, sym| async move { p.evaluate_asset(&sym).await })
            .await;

        let mut reports = Vec::with_capacity(results.len());
        for (sym, result) in results {
            match result {
                Ok(report) => reports.push(report),
                Err(e) => tracing::error!(symbol = %sym, error = %e, "evaluation not persisted"),
            }
        }
        let path = self
            .store
            .write_metrics_aggregate(&reports)
            .context("failed to write aggregate metrics")?;
        tracing::info!(path = %path.display(), assets = reports.len(), "metrics written");
        Ok(reports)
    }

    pub async fn run(&self) -> Result<RunSummary> {
        let backfill = self.backfill_all().await;
        let failed: HashSet<String> = backfill
            .iter()
            .filter(|s| !s.is_ok())
            .map(|s| s.symbol.clone())
            .collect();
        let forecasts = self.forecast_all_except(&failed).await?;
        let metrics = self.evaluate_all().await?;
        Ok(RunSummary {
            backfill,
            forecasts,
            metrics,
        })
    }
}
