//! Collaborator traits that the pipeline depends on instead of a concrete database.

use crate::error::DbError;
use async_trait::async_trait;
use core_types::{
    ActivityReport, CounterUpdate, InstrumentPrice, MarketSnapshot, PositionHit, StrategyConfig,
    TradeOutcome,
};

/// Reads recorded market snapshots.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Returns every price recorded at exactly `timestamp`, in insertion order.
    /// A timestamp with nothing recorded yields an empty snapshot, not an error.
    async fn read_snapshot(&self, timestamp: i64) -> Result<MarketSnapshot, DbError>;
}

/// Appends prices to the snapshot stored at a timestamp.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn write_prices(&self, timestamp: i64, prices: Vec<InstrumentPrice>)
        -> Result<(), DbError>;
}

/// Per-symbol statistics maintained outside the scanner.
#[async_trait]
pub trait StatsSource: Send + Sync {
    /// The most recent liquidity estimate for `symbol`, as stored (unparsed).
    async fn latest_liquidity(&self, symbol: &str) -> Result<Option<String>, DbError>;
}

#[async_trait]
pub trait StrategySource: Send + Sync {
    /// All strategies whose `tested` flag is false.
    async fn list_untested(&self) -> Result<Vec<StrategyConfig>, DbError>;
}

#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn write_trade_outcome(&self, outcome: &TradeOutcome) -> Result<(), DbError>;
    async fn write_activity_report(&self, report: &ActivityReport) -> Result<(), DbError>;
}

#[async_trait]
pub trait CounterSink: Send + Sync {
    /// Increments the flagged counters and applies the field patch atomically.
    /// Fails with [`DbError::NotFound`] when the strategy does not exist.
    async fn update_counters(&self, update: &CounterUpdate) -> Result<(), DbError>;
}

/// Per-symbol tallies of activity-list positions.
#[async_trait]
pub trait SymbolStatsSink: Send + Sync {
    /// Adds one to each symbol's count at its position, creating missing
    /// entries. The batch is applied atomically so a retried chunk never
    /// double counts.
    async fn record_positions(&self, hits: &[PositionHit]) -> Result<(), DbError>;
}

/// Everything a full scan cycle needs from storage, behind one handle.
pub trait ScannerStore:
    SnapshotSource
    + SnapshotSink
    + StatsSource
    + StrategySource
    + ReportSink
    + CounterSink
    + SymbolStatsSink
{
}

impl<T> ScannerStore for T where
    T: SnapshotSource
        + SnapshotSink
        + StatsSource
        + StrategySource
        + ReportSink
        + CounterSink
        + SymbolStatsSink
{
}
