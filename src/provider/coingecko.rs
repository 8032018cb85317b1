use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::config::{AssetsConfig, EndpointConfig, ProviderConfig};
use crate::error::AppError;
use crate::model::day::utc_from_epoch_ms;
use crate::model::price::PriceObservation;

use super::PriceSource;

const SOURCE_NAME: &str = "coingecko";

/// Entries stay untyped so one malformed pair drops only itself.
#[derive(Debug, Deserialize)]
struct MarketChartResponse {
    #[serde(default)]
    prices: Vec<Value>,
}

impl MarketChartResponse {
    fn into_observations(self) -> Vec<PriceObservation> {
        let total = self.prices.len();
        let observations: Vec<PriceObservation> = self
            .prices
            .iter()
            .filter_map(|entry| {
                let pair = entry.as_array()?;
                let ms = pair.first()?.as_f64().filter(|v| v.is_finite())?;
                let close = pair.get(1)?.as_f64().filter(|v| v.is_finite())?;
                Some(PriceObservation {
                    timestamp: utc_from_epoch_ms(ms.round() as i64)?,
                    close,
                })
            })
            .collect();
        if observations.len() < total {
            tracing::debug!(
                skipped = total - observations.len(),
                "malformed market_chart entries skipped"
            );
        }
        observations
    }
}

/// Daily market-chart client walking a ranked endpoint chain, one attempt per
/// endpoint.
pub struct CoinGeckoClient {
    http: reqwest::Client,
    endpoints: Vec<EndpointConfig>,
    ids: HashMap<String, String>,
    vs_currency: String,
    lookback_days: String,
}

impl CoinGeckoClient {
    pub fn new(provider: &ProviderConfig, assets: &AssetsConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(provider.request_timeout_secs.max(1)))
            .build()?;
        let ids = assets
            .tradable_symbols()
            .into_iter()
            .filter_map(|sym| {
                let id = assets.coingecko_id(&sym)?.to_string();
                Some((sym, id))
            })
            .collect();
        Ok(Self {
            http,
            endpoints: provider.ranked_endpoints(),
            ids,
            vs_currency: provider.vs_currency.clone(),
            lookback_days: provider.lookback_days.clone(),
        })
    }

    pub fn endpoint_labels(&self) -> Vec<&str> {
        self.endpoints.iter().map(|ep| ep.label.as_str()).collect()
    }

    async fn fetch_from(
        &self,
        endpoint: &EndpointConfig,
        coin_id: &str,
    ) -> Result<Vec<PriceObservation>, AppError> {
        let url = format!(
            "{}/coins/{}/market_chart",
            endpoint.base_url.trim_end_matches('/'),
            coin_id
        );
        let mut req = self.http.get(&url).query(&[
            ("vs_currency", self.vs_currency.as_str()),
            ("days", self.lookback_days.as_str()),
            ("interval", "daily"),
        ]);
        if let (Some(header), Some(key)) = (&endpoint.api_key_header, &endpoint.api_key) {
            req = req.header(header.as_str(), key.as_str());
        }
        let resp = req.send().await?.error_for_status()?;
        let chart: MarketChartResponse = resp.json().await?;
        Ok(chart.into_observations())
    }
}

#[async_trait]
impl PriceSource for CoinGeckoClient {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn price_history(&self, symbol: &str) -> Result<Vec<PriceObservation>, AppError> {
        let key = symbol.trim().to_ascii_uppercase();
        let Some(coin_id) = self.ids.get(&key) else {
            return Err(AppError::source_unavailable(
                SOURCE_NAME,
                format!("no coin id configured for {}", key),
            ));
        };

        let mut last_error = String::from("no endpoints configured");
        for endpoint in &self.endpoints {
            match self.fetch_from(endpoint, coin_id).await {
                Ok(observations) => {
                    tracing::info!(
                        symbol = %key,
                        endpoint = %endpoint.label,
                        count = observations.len(),
                        "price history fetched"
                    );
                    return Ok(observations);
                }
                Err(e) => {
                    tracing::warn!(
                        symbol = %key,
                        endpoint = %endpoint.label,
                        error = %e,
                        "price endpoint failed, trying next"
                    );
                    last_error = format!("{}: {}", endpoint.label, e);
                }
            }
        }
        Err(AppError::source_unavailable(SOURCE_NAME, last_error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_chart_skips_malformed_pairs() {
        let chart: MarketChartResponse = serde_json::from_str(
            r#"{"prices": [
                [1704067200000, 42000.5],
                [1704153600000, null],
                [1704240000000],
                [1704240000000, "oops"],
                ["yesterday", 42100.0],
                7,
                [1704326400000, 43000.0]
            ]}"#,
        )
        .unwrap();
        let obs = chart.into_observations();
        assert_eq!(obs.len(), 2);
        assert!((obs[0].close - 42000.5).abs() < f64::EPSILON);
        assert_eq!(obs[1].timestamp.timestamp_millis(), 1704326400000);
    }

    #[test]
    fn market_chart_without_prices_is_empty() {
        let chart: MarketChartResponse = serde_json::from_str(r#"{"market_caps": []}"#).unwrap();
        assert!(chart.into_observations().is_empty());
    }
}
