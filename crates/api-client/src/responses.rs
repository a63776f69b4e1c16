use serde::Deserialize;

// Using `#[serde(rename = ..)]` to map Binance's single-letter stream keys onto readable names.

/// One entry from `GET /api/v3/ticker/price`.
#[derive(Debug, Clone, Deserialize)]
pub struct TickerPrice {
    pub symbol: String,
    pub price: String,
}

/// A trade event from the `<symbol>@trade` stream.
#[derive(Debug, Clone, Deserialize)]
pub struct WsTrade {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "p")]
    pub price: String,
    #[serde(rename = "T")]
    pub trade_time: i64,
}

/// Represents an error response from the Binance API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub code: i64,
    pub msg: String,
}
