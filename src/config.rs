use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::AppError;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub assets: AssetsConfig,
    pub provider: ProviderConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetsConfig {
    pub symbols: Vec<String>,
    #[serde(default)]
    pub coingecko_ids: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_vs_currency")]
    pub vs_currency: String,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub force_public: bool,
    pub endpoints: Vec<EndpointConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    pub label: String,
    pub base_url: String,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub api_key_header: Option<String>,
    #[serde(skip)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub docs_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub min_train_rows: usize,
    pub max_cv_folds: usize,
    pub max_depth: usize,
    pub n_trees: usize,
    pub learning_rate: f64,
    pub min_samples_leaf: usize,
    pub max_bins: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            min_train_rows: 120,
            max_cv_folds: 5,
            max_depth: 3,
            n_trees: 150,
            learning_rate: 0.05,
            min_samples_leaf: 20,
            max_bins: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub impute_missing_prob: bool,
    pub missing_prob_fallback: f64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            impute_missing_prob: true,
            missing_prob_fallback: 0.5,
        }
    }
}

impl EvaluationConfig {
    pub fn prob_fallback(&self) -> Option<f64> {
        self.impute_missing_prob
            .then_some(self.missing_prob_fallback.clamp(0.0, 1.0))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

fn default_vs_currency() -> String {
    "usd".to_string()
}

fn default_lookback_days() -> String {
    "max".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl AssetsConfig {
    /// Upper-cased, de-duplicated symbols in configured order.
    pub fn tradable_symbols(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for sym in &self.symbols {
            let s = sym.trim().to_ascii_uppercase();
            if !s.is_empty() && !out.iter().any(|v| v == &s) {
                out.push(s);
            }
        }
        out
    }

    pub fn coingecko_id(&self, symbol: &str) -> Option<&str> {
        let key = symbol.trim().to_ascii_uppercase();
        self.coingecko_ids
            .iter()
            .find(|(k, _)| k.trim().eq_ignore_ascii_case(&key))
            .map(|(_, v)| v.as_str())
    }
}

impl ProviderConfig {
    /// Endpoints in fallback order, without keyed endpoints that cannot be used.
    pub fn ranked_endpoints(&self) -> Vec<EndpointConfig> {
        self.endpoints
            .iter()
            .filter(|ep| match &ep.api_key_env {
                None => true,
                Some(_) => !self.force_public && ep.api_key.is_some(),
            })
            .cloned()
            .collect()
    }
}

impl ForecastConfig {
    pub fn model_id(&self) -> String {
        format!("gbt-d{}-n{}", self.max_depth, self.n_trees)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.max_cv_folds < 2 {
            return Err(AppError::Config(format!(
                "forecast.max_cv_folds must be >= 2, got {}",
                self.max_cv_folds
            )));
        }
        if self.n_trees == 0 || self.max_depth == 0 {
            return Err(AppError::Config(
                "forecast.n_trees and forecast.max_depth must be > 0".to_string(),
            ));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(AppError::Config(format!(
                "forecast.learning_rate must be in (0, 1], got {}",
                self.learning_rate
            )));
        }
        if self.max_bins < 2 {
            return Err(AppError::Config(format!(
                "forecast.max_bins must be >= 2, got {}",
                self.max_bins
            )));
        }
        Ok(())
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from_path(Path::new(DEFAULT_CONFIG_PATH))
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut config = Self::from_toml_str(&config_str)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        config.resolve_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("invalid config toml")
    }

    fn resolve_env(&mut self) {
        if let Ok(v) = std::env::var("CG_FORCE_PUBLIC") {
            if matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes") {
                self.provider.force_public = true;
            }
        }
        for ep in &mut self.provider.endpoints {
            ep.api_key = ep
                .api_key_env
                .as_deref()
                .and_then(|name| std::env::var(name).ok())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.assets.tradable_symbols().is_empty() {
            return Err(AppError::Config("assets.symbols is empty".to_string()).into());
        }
        if self.provider.endpoints.is_empty() {
            return Err(AppError::Config("provider.endpoints is empty".to_string()).into());
        }
        if self.provider.ranked_endpoints().is_empty() {
            return Err(AppError::Config(
                "no usable provider endpoint: every endpoint needs an API key that is unset"
                    .to_string(),
            )
            .into());
        }
        self.forecast.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[assets]
symbols = ["BTC", "eth", "LINK", "BTC"]

[assets.coingecko_ids]
BTC = "bitcoin"
ETH = "ethereum"
LINK = "chainlink"

[provider]
vs_currency = "usd"
lookback_days = "max"
request_timeout_secs = 30

[[provider.endpoints]]
label = "pro"
base_url = "https://pro-api.coingecko.com/api/v3"
api_key_env = "COINGECKO_API_KEY"
api_key_header = "x-cg-pro-api-key"

[[provider.endpoints]]
label = "public"
base_url = "https://api.coingecko.com/api/v3"

[storage]
data_dir = "data"
docs_dir = "docs"

[forecast]
min_train_rows = 120
max_cv_folds = 5

[logging]
level = "debug"
"#;

    #[test]
    fn parse_sample_toml() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.assets.symbols.len(), 4);
        assert_eq!(config.provider.endpoints.len(), 2);
        assert_eq!(config.forecast.min_train_rows, 120);
        assert_eq!(config.forecast.n_trees, 150);
        assert!((config.forecast.learning_rate - 0.05).abs() < f64::EPSILON);
        assert_eq!(config.evaluation.prob_fallback(), Some(0.5));
        assert_eq!(config.logging.level, "debug");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn tradable_symbols_dedup_and_uppercase() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert_eq!(
            config.assets.tradable_symbols(),
            vec!["BTC".to_string(), "ETH".to_string(), "LINK".to_string()]
        );
        assert_eq!(config.assets.coingecko_id("eth"), Some("ethereum"));
        assert_eq!(config.assets.coingecko_id("DOGE"), None);
    }

    #[test]
    fn keyed_endpoint_dropped_without_key_or_when_forced_public() {
        let mut config = Config::from_toml_str(SAMPLE).unwrap();
        let labels: Vec<String> = config
            .provider
            .ranked_endpoints()
            .into_iter()
            .map(|ep| ep.label)
            .collect();
        assert_eq!(labels, vec!["public".to_string()]);

        config.provider.endpoints[0].api_key = Some("k".to_string());
        let labels: Vec<String> = config
            .provider
            .ranked_endpoints()
            .into_iter()
            .map(|ep| ep.label)
            .collect();
        assert_eq!(labels, vec!["pro".to_string(), "public".to_string()]);

        config.provider.force_public = true;
        assert_eq!(config.provider.ranked_endpoints().len(), 1);
    }

    #[test]
    fn validate_rejects_bad_forecast_settings() {
        let mut config = Config::from_toml_str(SAMPLE).unwrap();
        config.forecast.max_cv_folds = 1;
        assert!(config.validate().is_err());

        let mut config = Config::from_toml_str(SAMPLE).unwrap();
        config.forecast.learning_rate = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::from_toml_str(SAMPLE).unwrap();
        config.assets.symbols = vec!["  ".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_chain_of_unkeyed_endpoints() {
        let mut config = Config::from_toml_str(SAMPLE).unwrap();
        config.provider.endpoints.truncate(1);
        assert!(config.validate().is_err());

        config.provider.endpoints[0].api_key = Some("k".to_string());
        assert!(config.validate().is_ok());

        config.provider.force_public = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn model_id_reflects_tree_settings() {
        assert_eq!(ForecastConfig::default().model_id(), "gbt-d3-n150");
    }
}
