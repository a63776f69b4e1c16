use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Failed to build the HTTP request: {0}")]
    RequestBuild(#[from] reqwest::Error),

    #[error("The exchange returned error {0}: {1}")]
    Exchange(i64, String),

    #[error("Failed to deserialize the API response: {0}")]
    Deserialization(String),

    #[error("Invalid data format from API: {0}")]
    InvalidData(String),

    #[error("Invalid endpoint configuration: {0}")]
    Endpoint(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Trade stream closed: {0}")]
    StreamClosed(String),
}
