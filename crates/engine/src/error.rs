use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("API client error: {0}")]
    ApiClient(#[from] api_client::ApiError),

    #[error("Database error: {0}")]
    Database(#[from] database::DbError),

    #[error("Calculation error: {0}")]
    Core(#[from] core_types::CoreError),

    #[error("Filter error: {0}")]
    Filter(#[from] filters::FilterError),

    #[error("Trade stream for '{0}' ended before an exit condition was met")]
    StreamEnded(String),

    #[error("Opening price for '{symbol}' is not usable: {price}")]
    InvalidOpeningPrice { symbol: String, price: rust_decimal::Decimal },

    #[error("Could not read recorded prices: {0}")]
    Replay(String),

    #[error("Serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}
