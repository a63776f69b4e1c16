use async_trait::async_trait;
use configuration::ApiConfig;
use core_types::InstrumentPrice;
use reqwest::header::{HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::str::FromStr;

pub mod error;
pub mod live_connector;
pub mod responses;
// --- Public API ---
pub use error::ApiError;
pub use live_connector::{LiveConnector, TradeStream};
pub use responses::{ApiErrorResponse, TickerPrice, WsTrade};

/// The market-data interface the paper-trade engine depends on.
///
/// Implemented by `BinanceClient` for live use; tests provide scripted feeds.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Point-in-time last traded price for a symbol.
    async fn latest_price(&self, symbol: &str) -> Result<Decimal, ApiError>;

    /// Opens a live trade-print subscription for a symbol.
    async fn subscribe_trades(&self, symbol: &str) -> Result<TradeStream, ApiError>;
}

/// A concrete implementation of the `PriceFeed` for the Binance spot exchange.
#[derive(Clone)]
pub struct BinanceClient {
    client: reqwest::Client,
    base_url: String,
    connector: LiveConnector,
}

impl BinanceClient {
    pub fn new(api_config: &ApiConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        if !api_config.api_key.is_empty() {
            let key = HeaderValue::from_str(&api_config.api_key)
                .map_err(|e| ApiError::Endpoint(format!("invalid API key header: {e}")))?;
            headers.insert("X-MBX-APIKEY", key);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(api_config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: api_config.rest_base_url.trim_end_matches('/').to_string(),
            connector: LiveConnector::new(&api_config.ws_base_url)?,
        })
    }

    async fn get_public<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).query(query).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            serde_json::from_str::<T>(&text).map_err(|e| ApiError::Deserialization(e.to_string()))
        } else {
            let api_error: ApiErrorResponse = serde_json::from_str(&text).map_err(|e| {
                ApiError::Deserialization(format!(
                    "Failed to deserialize error response: {e}. Raw body: {text}"
                ))
            })?;
            Err(ApiError::Exchange(api_error.code, api_error.msg))
        }
    }

    /// Fetches the last price of every listed symbol, as used for a market snapshot.
    pub async fn fetch_all_prices(&self) -> Result<Vec<InstrumentPrice>, ApiError> {
        let tickers: Vec<TickerPrice> = self.get_public("/api/v3/ticker/price", &[]).await?;
        tracing::debug!(count = tickers.len(), "Fetched ticker prices.");
        Ok(into_instrument_prices(tickers))
    }
}

#[async_trait]
impl PriceFeed for BinanceClient {
    async fn latest_price(&self, symbol: &str) -> Result<Decimal, ApiError> {
        let upper = symbol.to_uppercase();
        let ticker: TickerPrice = self
            .get_public("/api/v3/ticker/price", &[("symbol", upper.as_str())])
            .await?;
        Decimal::from_str(&ticker.price)
            .map_err(|e| {
                ApiError::InvalidData(format!("price '{}' for {upper}: {e}", ticker.price))
            })
    }

    async fn subscribe_trades(&self, symbol: &str) -> Result<TradeStream, ApiError> {
        self.connector.subscribe_trades(symbol).await
    }
}

/// Converts the exchange's ticker list into snapshot entries, keeping the exchange's order.
pub fn into_instrument_prices(tickers: Vec<TickerPrice>) -> Vec<InstrumentPrice> {
    tickers
        .into_iter()
        .map(|t| InstrumentPrice::new(t.symbol, t.price))
        .collect()
}
