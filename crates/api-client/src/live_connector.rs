use crate::error::ApiError;
use crate::responses::WsTrade;
use core_types::TradeTick;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

/// How long `TradeStream::close` waits for the socket to say goodbye before aborting the reader.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// A live subscription to one symbol's trade prints.
///
/// Items are `Err` when the transport fails; after an `Err` (or `None`) the
/// stream is finished. Dropping the handle tears the connection down, `close`
/// does so gracefully.
pub struct TradeStream {
    symbol: String,
    ticks: mpsc::Receiver<Result<TradeTick, ApiError>>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl TradeStream {
    /// Wraps a channel fed by something other than a socket (replays, tests).
    pub fn from_receiver(
        symbol: impl Into<String>,
        ticks: mpsc::Receiver<Result<TradeTick, ApiError>>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            ticks,
            shutdown: None,
            task: None,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Waits for the next tick. `None` means the producer has gone away.
    pub async fn next(&mut self) -> Option<Result<TradeTick, ApiError>> {
        self.ticks.recv().await
    }

    /// Sends a close frame, waits briefly for the reader task, then releases everything.
    pub async fn close(mut self) {
        self.ticks.close();
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(CLOSE_GRACE, &mut task).await.is_err() {
                tracing::warn!(
                    symbol = %self.symbol,
                    "Trade stream did not close in time; aborting reader."
                );
                task.abort();
            }
        }
        tracing::debug!(symbol = %self.symbol, "Trade stream closed.");
    }
}

impl Drop for TradeStream {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Handles connections to the Binance spot WebSocket API.
#[derive(Debug, Clone)]
pub struct LiveConnector {
    base_url: Url,
}

impl LiveConnector {
    pub fn new(ws_base_url: &str) -> Result<Self, ApiError> {
        let base_url = Url::parse(ws_base_url)
            .map_err(|e| ApiError::Endpoint(format!("{ws_base_url}: {e}")))?;
        Ok(Self { base_url })
    }

    pub fn trade_stream_url(&self, symbol: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(&format!("/ws/{}@trade", symbol.to_lowercase()))
            .map_err(|e| ApiError::Endpoint(e.to_string()))
    }

    /// Dials the `<symbol>@trade` stream and forwards every trade print.
    ///
    /// A failed dial is returned immediately. There is no reconnection: once the
    /// socket errors or closes, the stream yields a final `Err` and ends.
    pub async fn subscribe_trades(&self, symbol: &str) -> Result<TradeStream, ApiError> {
        let url = self.trade_stream_url(symbol)?;
        let (socket, _) = connect_async(url.as_str())
            .await
            .map_err(|e| ApiError::WebSocket(e.to_string()))?;
        tracing::info!(symbol = %symbol, "Trade stream connection established.");

        let (tx, rx) = mpsc::channel(1024);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let stream_symbol = symbol.to_string();

        let task = tokio::spawn(async move {
            let (mut write, mut read) = socket.split();
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        if let Err(e) = write.send(Message::Close(None)).await {
                            tracing::debug!(
                                symbol = %stream_symbol,
                                error = %e,
                                "Close frame not delivered."
                            );
                        }
                        break;
                    }
                    msg = read.next() => match msg {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<WsTrade>(&text) {
                                Ok(trade) => {
                                    let tick = TradeTick {
                                        price: trade.price,
                                        trade_time_ms: trade.trade_time,
                                    };
                                    if tx.send(Ok(tick)).await.is_err() {
                                        break;
                                    }
                                }
                                Err(e) => {
                                    tracing::warn!(
                                        symbol = %stream_symbol,
                                        error = %e,
                                        raw = %text,
                                        "Failed to decode trade message."
                                    );
                                }
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let closed = ApiError::StreamClosed(format!("{frame:?}"));
                            let _ = tx.send(Err(closed)).await;
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            let _ = tx.send(Err(ApiError::WebSocket(e.to_string()))).await;
                            break;
                        }
                        None => {
                            let ended = ApiError::StreamClosed("socket ended".to_string());
                            let _ = tx.send(Err(ended)).await;
                            break;
                        }
                    }
                }
            }
        });

        Ok(TradeStream {
            symbol: symbol.to_string(),
            ticks: rx,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trade_stream_url_uses_lowercase_symbol() {
        let connector = LiveConnector::new("wss://stream.binance.com:9443").unwrap();
        let url = connector.trade_stream_url("BTCUSDT").unwrap();
        assert_eq!(url.as_str(), "wss://stream.binance.com:9443/ws/btcusdt@trade");
    }

    #[test]
    fn bad_base_url_is_rejected() {
        assert!(LiveConnector::new("not a url").is_err());
    }

    #[tokio::test]
    async fn channel_backed_stream_yields_then_ends() {
        let (tx, rx) = mpsc::channel(4);
        let mut stream = TradeStream::from_receiver("ETHUSDT", rx);
        tx.send(Ok(TradeTick { price: "10".to_string(), trade_time_ms: 1 }))
            .await
            .unwrap();
        drop(tx);

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.price, "10");
        assert!(stream.next().await.is_none());
        assert_eq!(stream.symbol(), "ETHUSDT");
        stream.close().await;
    }

    #[tokio::test]
    async fn close_releases_the_producer() {
        let (tx, rx) = mpsc::channel::<Result<TradeTick, ApiError>>(1);
        let stream = TradeStream::from_receiver("ETHUSDT", rx);
        stream.close().await;
        assert!(tx.is_closed());
    }
}
