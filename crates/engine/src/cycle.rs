use crate::clock::{Clock, SystemClock};
use crate::dispatcher::{StrategyDispatcher, StrategyRun};
use crate::paper_trade::PaperTradeEngine;
use analytics::{AnalyticsEngine, position_hits};
use api_client::PriceFeed;
use configuration::ScannerSettings;
use core_types::{ActivityReport, Candidate, MarketSnapshot, PositionHit, previous_frame};
use database::{ChunkedRetryWriter, DbError, ScannerStore};
use filters::{BypassVolatility, VolatilityFilter, activity_filter, enrich, liquidity_filter};
use std::sync::Arc;

/// Counts and results of one pass through the pipeline.
#[derive(Debug, Clone)]
pub struct CycleSummary {
    pub timestamp: i64,
    pub snapshot_size: usize,
    pub active_count: usize,
    pub liquid_count: usize,
    pub activity_report: Option<ActivityReport>,
    pub runs: Vec<StrategyRun>,
}

impl CycleSummary {
    fn empty(timestamp: i64) -> Self {
        Self {
            timestamp,
            snapshot_size: 0,
            active_count: 0,
            liquid_count: 0,
            activity_report: None,
            runs: Vec::new(),
        }
    }
}

/// One scan: enrich, filter, report, then dispatch every untested strategy.
pub struct ScanCycle {
    store: Arc<dyn ScannerStore>,
    analytics: AnalyticsEngine,
    dispatcher: StrategyDispatcher,
    writer: ChunkedRetryWriter,
    settings: ScannerSettings,
}

impl ScanCycle {
    pub fn new<S>(
        store: Arc<S>,
        feed: Arc<dyn PriceFeed>,
        settings: ScannerSettings,
        writer: ChunkedRetryWriter,
    ) -> Self
    where
        S: ScannerStore + 'static,
    {
        Self::with_parts(
            store,
            feed,
            settings,
            writer,
            Arc::new(SystemClock),
            Arc::new(BypassVolatility),
        )
    }

    pub fn with_parts<S>(
        store: Arc<S>,
        feed: Arc<dyn PriceFeed>,
        settings: ScannerSettings,
        writer: ChunkedRetryWriter,
        clock: Arc<dyn Clock>,
        volatility: Arc<dyn VolatilityFilter>,
    ) -> Self
    where
        S: ScannerStore + 'static,
    {
        let engine = Arc::new(PaperTradeEngine::new(
            feed,
            store.clone(),
            store.clone(),
            writer.clone(),
            settings.fee_pct,
            clock,
        ));
        let dispatcher = StrategyDispatcher::new(store.clone(), engine, volatility);

        Self {
            store,
            analytics: AnalyticsEngine::new(settings.top_averages.clone()),
            dispatcher,
            writer,
            settings,
        }
    }

    /// Runs the pipeline for the frame at `timestamp`. Data gaps and per-strategy
    /// failures are logged; the cycle itself always completes.
    pub async fn run(&self, timestamp: i64) -> CycleSummary {
        let mut summary = CycleSummary::empty(timestamp);

        let current = self.snapshot_or_empty(timestamp).await;
        if current.is_empty() {
            tracing::warn!(timestamp, "No snapshot recorded for this frame; nothing to scan.");
            return summary;
        }
        let previous = self.snapshot_or_empty(previous_frame(timestamp)).await;
        if previous.is_empty() {
            tracing::warn!(timestamp, "No previous snapshot; changes cannot be computed.");
        }
        summary.snapshot_size = current.len();

        let enriched = enrich(&current, &previous);
        let active = activity_filter(&enriched, self.settings.active_market_threshold);
        summary.active_count = active.len();
        if active.is_empty() {
            tracing::info!(timestamp, pairs = summary.snapshot_size, "No pairs on the move.");
            return summary;
        }
        self.record_symbol_stats(&active).await;
        summary.activity_report = self.report_activity(timestamp, &active).await;

        let liquid =
            liquidity_filter(self.store.as_ref(), active, self.settings.liquidity_threshold).await;
        summary.liquid_count = liquid.len();
        tracing::info!(
            timestamp,
            pairs = summary.snapshot_size,
            active = summary.active_count,
            liquid = summary.liquid_count,
            "Filters applied."
        );

        let strategies = match self.store.list_untested().await {
            Ok(strategies) => strategies,
            Err(e) => {
                tracing::error!(error = %e, "Could not load strategies.");
                return summary;
            }
        };
        if liquid.is_empty() || strategies.is_empty() {
            tracing::info!(strategies = strategies.len(), "Nothing to dispatch.");
            return summary;
        }

        summary.runs = self.dispatcher.dispatch(timestamp, &liquid, strategies).await;
        summary
    }

    async fn snapshot_or_empty(&self, timestamp: i64) -> MarketSnapshot {
        match self.store.read_snapshot(timestamp).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(timestamp, error = %e, "Snapshot read failed.");
                MarketSnapshot::empty(timestamp)
            }
        }
    }

    /// Tallies where each leading active symbol placed this frame. A failed
    /// write is logged and the cycle goes on.
    async fn record_symbol_stats(&self, active: &[Candidate]) {
        let hits = position_hits(active);
        let store = self.store.as_ref();
        let written = self
            .writer
            .write_all(&hits, move |chunk: Vec<PositionHit>| async move {
                store.record_positions(&chunk).await
            })
            .await;
        if let Err(e) = written {
            tracing::error!(error = %e, "Symbol stats could not be saved.");
        }
    }

    async fn report_activity(
        &self,
        timestamp: i64,
        active: &[Candidate],
    ) -> Option<ActivityReport> {
        let report = match self.analytics.activity_report(timestamp, active) {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(error = %e, "Activity report skipped.");
                return None;
            }
        };

        let store = self.store.as_ref();
        let written = self
            .writer
            .write_one(&report, move |batch: Vec<ActivityReport>| async move {
                for record in &batch {
                    store.write_activity_report(record).await?;
                }
                Ok::<(), DbError>(())
            })
            .await;
        if let Err(e) = written {
            tracing::error!(error = %e, "Activity report could not be saved.");
        }
        Some(report)
    }
}
