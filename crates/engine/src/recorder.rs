use crate::error::EngineError;
use core_types::{InstrumentPrice, MarketSnapshot};
use database::{ChunkedRetryWriter, DbError, SnapshotSink};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const REPLAY_PREFIX: &str = "binance_prices_";
const REPLAY_SUFFIX: &str = ".json";

#[derive(Debug, Deserialize)]
struct RecordedSnapshot {
    timestamp: i64,
    #[serde(alias = "pairs")]
    pair: Vec<RecordedPair>,
}

#[derive(Debug, Deserialize)]
struct RecordedPair {
    symbol: String,
    price: String,
}

/// Parses one price file: a JSON array of `{"timestamp", "pair": [{"symbol", "price"}]}`.
pub fn parse_recorded_prices(contents: &str) -> Result<Vec<MarketSnapshot>, EngineError> {
    let recorded: Vec<RecordedSnapshot> = serde_json::from_str(contents)?;
    Ok(recorded
        .into_iter()
        .map(|snapshot| {
            let prices = snapshot
                .pair
                .into_iter()
                .map(|p| InstrumentPrice::new(p.symbol, p.price))
                .collect();
            MarketSnapshot::new(snapshot.timestamp, prices)
        })
        .collect())
}

/// Price files under `dir`, in lexical (and therefore date) order.
pub fn replay_files(dir: &Path) -> Result<Vec<PathBuf>, EngineError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| EngineError::Replay(format!("{}: {e}", dir.display())))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| {
                        name.starts_with(REPLAY_PREFIX) && name.ends_with(REPLAY_SUFFIX)
                    })
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Persists a snapshot through the chunked writer. Returns the number of chunks written.
pub async fn record_snapshot<S>(
    sink: &S,
    writer: &ChunkedRetryWriter,
    snapshot: &MarketSnapshot,
) -> Result<usize, EngineError>
where
    S: SnapshotSink + ?Sized,
{
    if snapshot.is_empty() {
        tracing::warn!(timestamp = snapshot.timestamp, "Skipping empty snapshot.");
        return Ok(0);
    }

    let timestamp = snapshot.timestamp;
    let chunks = writer
        .write_all(&snapshot.prices, move |chunk: Vec<InstrumentPrice>| async move {
            sink.write_prices(timestamp, chunk).await?;
            Ok::<(), DbError>(())
        })
        .await?;

    tracing::info!(timestamp, prices = snapshot.len(), chunks, "Snapshot recorded.");
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use database::{MemoryStore, SnapshotSource};
    use std::time::Duration;

    #[test]
    fn parses_both_pair_spellings() {
        let json = r#"[
            {"timestamp": 1700000100, "pair": [{"symbol": "BTCUSDT", "price": "100.5"}]},
            {"timestamp": 1700000400, "pairs": [{"symbol": "ETHUSDT", "price": "10"}, {"symbol": "BTCUSDT", "price": "101"}]}
        ]"#;

        let snapshots = parse_recorded_prices(json).unwrap();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].get("BTCUSDT").unwrap().price, "100.5");
        assert_eq!(snapshots[1].timestamp, 1_700_000_400);
        assert_eq!(snapshots[1].len(), 2);
    }

    #[test]
    fn malformed_files_are_errors() {
        assert!(matches!(parse_recorded_prices("{not json"), Err(EngineError::SerdeJson(_))));
    }

    #[tokio::test]
    async fn records_in_chunks() {
        let store = MemoryStore::new();
        let writer = ChunkedRetryWriter::new(2, 1, Duration::from_millis(1));
        let snapshot = MarketSnapshot::new(
            300,
            (0..5).map(|i| InstrumentPrice::new(format!("P{i}USDT"), "1")).collect(),
        );

        let chunks = record_snapshot(&store, &writer, &snapshot).await.unwrap();
        assert_eq!(chunks, 3);
        assert_eq!(store.read_snapshot(300).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn retries_a_rejected_chunk() {
        let store = MemoryStore::new();
        store.reject_next_writes(1);
        let writer = ChunkedRetryWriter::new(10, 1, Duration::from_millis(1));
        let snapshot = MarketSnapshot::new(600, vec![InstrumentPrice::new("BTCUSDT", "1")]);

        record_snapshot(&store, &writer, &snapshot).await.unwrap();
        assert_eq!(store.read_snapshot(600).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_snapshots_write_nothing() {
        let store = MemoryStore::new();
        let writer = ChunkedRetryWriter::new(10, 1, Duration::from_millis(1));
        let chunks = record_snapshot(&store, &writer, &MarketSnapshot::empty(0)).await.unwrap();
        assert_eq!(chunks, 0);
        assert!(store.snapshot_timestamps().await.is_empty());
    }
}
