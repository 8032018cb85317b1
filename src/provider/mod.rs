pub mod coingecko;
pub mod vol_feed;

use async_trait::async_trait;

use crate::error::AppError;
use crate::model::price::PriceObservation;
use crate::model::vol::VolObservation;

pub use coingecko::CoinGeckoClient;
pub use vol_feed::FileVolFeed;

/// Price history for one asset over the configured lookback window.
#[async_trait]
pub trait PriceSource: Send + Sync {
    fn name(&self) -> &str;

    /// An empty history is not an error. Exhausting every upstream is
    /// `AppError::SourceUnavailable`.
    async fn price_history(&self, symbol: &str) -> Result<Vec<PriceObservation>, AppError>;
}

/// Intraday implied-volatility observations for one asset.
#[async_trait]
pub trait VolSource: Send + Sync {
    fn name(&self) -> &str;

    async fn vol_history(&self, symbol: &str) -> Result<Vec<VolObservation>, AppError>;
}
