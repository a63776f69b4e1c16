use crate::paper_trade::PaperTradeEngine;
use core_types::{Candidate, StrategyConfig, TradeOutcome};
use database::SnapshotSource;
use filters::{MomentumParams, VolatilityFilter, momentum_filter, promoted};
use futures::future::join_all;
use std::sync::Arc;

/// What happened to one strategy during a cycle.
#[derive(Debug, Clone)]
pub enum StrategyResult {
    Traded(TradeOutcome),
    /// Momentum promoted nothing.
    NoCandidate,
    /// The strategy's parameters were unusable.
    Skipped(String),
    /// The session aborted (transport, persistence, or a panicked task).
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct StrategyRun {
    pub strategy: String,
    pub symbol: Option<String>,
    pub result: StrategyResult,
}

/// Fans out one task per strategy and joins them all before returning.
#[derive(Clone)]
pub struct StrategyDispatcher {
    snapshots: Arc<dyn SnapshotSource>,
    engine: Arc<PaperTradeEngine>,
    volatility: Arc<dyn VolatilityFilter>,
}

impl StrategyDispatcher {
    pub fn new(
        snapshots: Arc<dyn SnapshotSource>,
        engine: Arc<PaperTradeEngine>,
        volatility: Arc<dyn VolatilityFilter>,
    ) -> Self {
        Self {
            snapshots,
            engine,
            volatility,
        }
    }

    /// Runs every untested strategy against its own copy of `candidates`.
    ///
    /// A failing or panicking strategy task is reported in its `StrategyRun`
    /// and never affects the others.
    pub async fn dispatch(
        &self,
        base_timestamp: i64,
        candidates: &[Candidate],
        strategies: Vec<StrategyConfig>,
    ) -> Vec<StrategyRun> {
        let mut names = Vec::new();
        let mut handles = Vec::new();

        for strategy in strategies.into_iter().filter(|s| !s.tested) {
            names.push(strategy.name.clone());
            let dispatcher = self.clone();
            let own_candidates = candidates.to_vec();
            handles.push(tokio::spawn(async move {
                dispatcher
                    .run_strategy(base_timestamp, own_candidates, strategy)
                    .await
            }));
        }

        tracing::info!(strategies = handles.len(), "Dispatched strategy tasks.");

        join_all(handles)
            .await
            .into_iter()
            .zip(names)
            .map(|(joined, name)| match joined {
                Ok(run) => run,
                Err(e) => {
                    tracing::error!(strategy = %name, error = %e, "Strategy task panicked.");
                    StrategyRun {
                        strategy: name,
                        symbol: None,
                        result: StrategyResult::Failed(e.to_string()),
                    }
                }
            })
            .collect()
    }

    async fn run_strategy(
        &self,
        base_timestamp: i64,
        candidates: Vec<Candidate>,
        strategy: StrategyConfig,
    ) -> StrategyRun {
        let mut run = StrategyRun {
            strategy: strategy.name.clone(),
            symbol: None,
            result: StrategyResult::NoCandidate,
        };

        let params = MomentumParams::from(&strategy);
        let snapshots = self.snapshots.as_ref();
        let evaluated = match momentum_filter(snapshots, base_timestamp, candidates, params).await {
            Ok(evaluated) => evaluated,
            Err(e) => {
                tracing::warn!(strategy = %strategy.name, error = %e, "Skipping strategy.");
                run.result = StrategyResult::Skipped(e.to_string());
                return run;
            }
        };

        let promoted = promoted(&evaluated);
        let Some(selected) = self.volatility.select(&promoted) else {
            tracing::info!(strategy = %strategy.name, "No momentum candidates.");
            return run;
        };
        run.symbol = Some(selected.symbol.clone());

        run.result = match self.engine.run(&strategy, &selected.symbol).await {
            Ok(outcome) => StrategyResult::Traded(outcome),
            Err(e) => {
                tracing::error!(
                    strategy = %strategy.name,
                    symbol = %selected.symbol,
                    error = %e,
                    "Paper trade aborted."
                );
                StrategyResult::Failed(e.to_string())
            }
        };
        run
    }
}
