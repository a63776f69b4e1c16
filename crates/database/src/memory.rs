//! An in-process store implementing every collaborator trait.
//!
//! Lets the pipeline run without a database; the unit and integration tests
//! seed it directly.

use crate::error::DbError;
use crate::store::{
    CounterSink, ReportSink, SnapshotSink, SnapshotSource, StatsSource, StrategySource,
    SymbolStatsSink,
};
use async_trait::async_trait;
use core_types::{
    ActivityReport, CounterUpdate, InstrumentPrice, MarketSnapshot, PositionHit, StrategyConfig,
    SymbolStats, TradeOutcome,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshots: RwLock<BTreeMap<i64, Vec<InstrumentPrice>>>,
    liquidity: RwLock<HashMap<String, String>>,
    strategies: RwLock<Vec<StrategyConfig>>,
    outcomes: RwLock<Vec<TradeOutcome>>,
    activity: RwLock<Vec<ActivityReport>>,
    symbol_stats: RwLock<HashMap<String, SymbolStats>>,
    /// Number of upcoming writes that will be rejected.
    rejected_writes: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_snapshot(&self, snapshot: MarketSnapshot) {
        self.snapshots
            .write()
            .await
            .insert(snapshot.timestamp, snapshot.prices);
    }

    pub async fn set_liquidity(&self, symbol: impl Into<String>, estimate: impl Into<String>) {
        self.liquidity
            .write()
            .await
            .insert(symbol.into(), estimate.into());
    }

    pub async fn add_strategy(&self, strategy: StrategyConfig) {
        self.strategies.write().await.push(strategy);
    }

    /// Rejects the next `count` writes of any kind with [`DbError::WriteRejected`].
    pub fn reject_next_writes(&self, count: u32) {
        self.rejected_writes.store(count, Ordering::SeqCst);
    }

    pub async fn strategies(&self) -> Vec<StrategyConfig> {
        self.strategies.read().await.clone()
    }

    pub async fn strategy(&self, name: &str) -> Option<StrategyConfig> {
        self.strategies
            .read()
            .await
            .iter()
            .find(|s| s.name == name)
            .cloned()
    }

    pub async fn outcomes(&self) -> Vec<TradeOutcome> {
        self.outcomes.read().await.clone()
    }

    pub async fn activity_reports(&self) -> Vec<ActivityReport> {
        self.activity.read().await.clone()
    }

    pub async fn symbol_stats(&self, symbol: &str) -> Option<SymbolStats> {
        self.symbol_stats.read().await.get(symbol).cloned()
    }

    pub async fn snapshot_timestamps(&self) -> Vec<i64> {
        self.snapshots.read().await.keys().copied().collect()
    }

    fn check_write(&self) -> Result<(), DbError> {
        let rejected = self
            .rejected_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match rejected {
            Ok(_) => Err(DbError::WriteRejected("injected failure".to_string())),
            Err(_) => Ok(()),
        }
    }
}

#[async_trait]
impl SnapshotSource for MemoryStore {
    async fn read_snapshot(&self, timestamp: i64) -> Result<MarketSnapshot, DbError> {
        let prices = self
            .snapshots
            .read()
            .await
            .get(&timestamp)
            .cloned()
            .unwrap_or_default();
        Ok(MarketSnapshot::new(timestamp, prices))
    }
}

#[async_trait]
impl SnapshotSink for MemoryStore {
    async fn write_prices(
        &self,
        timestamp: i64,
        prices: Vec<InstrumentPrice>,
    ) -> Result<(), DbError> {
        self.check_write()?;
        self.snapshots
            .write()
            .await
            .entry(timestamp)
            .or_default()
            .extend(prices);
        Ok(())
    }
}

#[async_trait]
impl StatsSource for MemoryStore {
    async fn latest_liquidity(&self, symbol: &str) -> Result<Option<String>, DbError> {
        Ok(self.liquidity.read().await.get(symbol).cloned())
    }
}

#[async_trait]
impl StrategySource for MemoryStore {
    async fn list_untested(&self) -> Result<Vec<StrategyConfig>, DbError> {
        Ok(self
            .strategies
            .read()
            .await
            .iter()
            .filter(|s| !s.tested)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReportSink for MemoryStore {
    async fn write_trade_outcome(&self, outcome: &TradeOutcome) -> Result<(), DbError> {
        self.check_write()?;
        self.outcomes.write().await.push(outcome.clone());
        Ok(())
    }

    async fn write_activity_report(&self, report: &ActivityReport) -> Result<(), DbError> {
        self.check_write()?;
        self.activity.write().await.push(report.clone());
        Ok(())
    }
}

#[async_trait]
impl CounterSink for MemoryStore {
    async fn update_counters(&self, update: &CounterUpdate) -> Result<(), DbError> {
        self.check_write()?;
        let mut strategies = self.strategies.write().await;
        let strategy = strategies
            .iter_mut()
            .find(|s| s.name == update.strategy_name)
            .ok_or_else(|| DbError::NotFound(update.strategy_name.clone()))?;
        update.apply_to(strategy);
        Ok(())
    }
}

#[async_trait]
impl SymbolStatsSink for MemoryStore {
    async fn record_positions(&self, hits: &[PositionHit]) -> Result<(), DbError> {
        self.check_write()?;
        let mut stats = self.symbol_stats.write().await;
        for hit in hits {
            stats
                .entry(hit.symbol.clone())
                .or_insert_with(|| SymbolStats::new(hit.symbol.clone()))
                .record(hit.position);
        }
        Ok(())
    }
}
