use crate::error::ConfigError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::time::Duration;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub scanner: ScannerSettings,
    #[serde(default)]
    pub writer: WriterSettings,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Rejects values the pipeline cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.scanner;
        if s.top_averages.is_empty() || s.top_averages.iter().any(|n| *n == 0) {
            return Err(ConfigError::ValidationError(
                "scanner.top_averages must contain positive values".to_string(),
            ));
        }
        if s.active_market_threshold.is_sign_negative() || s.liquidity_threshold.is_sign_negative()
        {
            return Err(ConfigError::ValidationError(
                "scanner thresholds must not be negative".to_string(),
            ));
        }
        if s.fee_pct.is_sign_negative() || s.fee_pct >= dec!(100) {
            return Err(ConfigError::ValidationError(format!(
                "scanner.fee_pct must be in [0, 100), got {}",
                s.fee_pct
            )));
        }
        if self.writer.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "writer.chunk_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parameters of the filter pipeline shared by every strategy.
#[derive(Debug, Clone, Deserialize)]
pub struct ScannerSettings {
    /// Minimum percentage change since the previous snapshot (already in percent).
    pub active_market_threshold: Decimal,
    /// Minimum liquidity estimate for a candidate to stay in the pipeline.
    pub liquidity_threshold: Decimal,
    /// The N values of the ranked average-gain report, e.g. `[3, 5, 10]`.
    pub top_averages: Vec<usize>,
    /// Fee charged on each leg of a paper trade, in percent (0.06 = 0.06%).
    #[serde(default = "default_fee_pct")]
    pub fee_pct: Decimal,
}

/// Batching and retry behaviour for persisted result sets.
#[derive(Debug, Clone, Deserialize)]
pub struct WriterSettings {
    pub chunk_size: usize,
    pub max_retries: u32,
    /// The retry before attempt `n` waits `n * 2` of these units.
    pub backoff_unit_ms: u64,
}

impl WriterSettings {
    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            max_retries: 3,
            backoff_unit_ms: 1000,
        }
    }
}

/// Exchange endpoints and credentials. Built once at start-up and handed to the client.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub rest_base_url: String,
    pub ws_base_url: String,
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub api_key: String,
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            rest_base_url: "https://api.binance.com".to_string(),
            ws_base_url: "wss://stream.binance.com:9443".to_string(),
            request_timeout_secs: 10,
            api_key: String::new(),
        }
    }
}

/// Connection pool sizing and per-call timeouts for the store.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub max_connections: u32,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
}

impl DatabaseSettings {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            read_timeout_secs: 10,
            write_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence when set.
    pub level: String,
    pub directory: String,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: "logs".to_string(),
            file_prefix: "scanner.log".to_string(),
        }
    }
}

fn default_fee_pct() -> Decimal {
    dec!(0.06)
}

#[cfg(test)]
mod tests {
    use crate::config_from_toml;
    use rust_decimal_macros::dec;

    const MINIMAL: &str = r#"
        [scanner]
        active_market_threshold = 0.1
        liquidity_threshold = 500
        top_averages = [3, 5, 10]
    "#;

    #[test]
    fn minimal_file_fills_defaults() {
        let config = config_from_toml(MINIMAL).unwrap();
        assert_eq!(config.scanner.active_market_threshold, dec!(0.1));
        assert_eq!(config.scanner.liquidity_threshold, dec!(500));
        assert_eq!(config.scanner.top_averages, vec![3, 5, 10]);
        assert_eq!(config.scanner.fee_pct, dec!(0.06));
        assert_eq!(config.writer.chunk_size, 500);
        assert_eq!(config.writer.max_retries, 3);
        assert_eq!(config.api.rest_base_url, "https://api.binance.com");
        assert_eq!(config.database.write_timeout().as_secs(), 60);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn fee_is_configurable() {
        let doc = format!("{MINIMAL}\nfee_pct = 0.1\n");
        let config = config_from_toml(&doc).unwrap();
        assert_eq!(config.scanner.fee_pct, dec!(0.1));
    }

    #[test]
    fn empty_top_averages_is_rejected() {
        let doc = r#"
            [scanner]
            active_market_threshold = 0.1
            liquidity_threshold = 500
            top_averages = []
        "#;
        assert!(config_from_toml(doc).is_err());
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let doc = format!(
            "{MINIMAL}\n[writer]\nchunk_size = 0\nmax_retries = 1\nbackoff_unit_ms = 1\n"
        );
        assert!(config_from_toml(&doc).is_err());
    }
}
