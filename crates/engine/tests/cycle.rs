use api_client::{ApiError, PriceFeed, TradeStream};
use async_trait::async_trait;
use configuration::ScannerSettings;
use core_types::{
    InstrumentPrice, MarketSnapshot, OutcomeKind, StrategyConfig, TradeTick, frame_timestamp,
};
use database::{ChunkedRetryWriter, MemoryStore};
use engine::{FixedClock, PaperTradeEngine, ScanCycle, StrategyResult};
use filters::BypassVolatility;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

const BASE: i64 = 1_700_000_100;
const OPENED_AT: i64 = 1_700_000_100_000;

type Script = Vec<Result<TradeTick, ApiError>>;

/// A price feed that plays back canned ticks, one script per subscription.
#[derive(Default)]
struct ScriptedFeed {
    prices: HashMap<String, Decimal>,
    scripts: Mutex<HashMap<String, VecDeque<Script>>>,
}

impl ScriptedFeed {
    fn with_price(mut self, symbol: &str, price: Decimal) -> Self {
        self.prices.insert(symbol.to_string(), price);
        self
    }

    fn with_script(self, symbol: &str, script: Script) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(symbol.to_string())
            .or_default()
            .push_back(script);
        self
    }
}

#[async_trait]
impl PriceFeed for ScriptedFeed {
    async fn latest_price(&self, symbol: &str) -> Result<Decimal, ApiError> {
        self.prices
            .get(symbol)
            .copied()
            .ok_or_else(|| ApiError::InvalidData(format!("no price for {symbol}")))
    }

    async fn subscribe_trades(&self, symbol: &str) -> Result<TradeStream, ApiError> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(symbol)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_default();

        let (tx, rx) = mpsc::channel(script.len().max(1));
        for item in script {
            tx.try_send(item).unwrap();
        }
        // Dropping the sender ends the stream once the script is consumed.
        Ok(TradeStream::from_receiver(symbol, rx))
    }
}

fn tick(price: &str, after_ms: i64) -> Result<TradeTick, ApiError> {
    Ok(TradeTick {
        price: price.to_string(),
        trade_time_ms: OPENED_AT + after_ms,
    })
}

fn strategy(name: &str, short: usize, long: usize) -> StrategyConfig {
    StrategyConfig {
        name: name.to_string(),
        short_window: short,
        long_window: long,
        momentum_threshold: dec!(0.5),
        trade_duration_minutes: 10,
        take_profit_pct: dec!(2),
        stop_loss_pct: dec!(1),
        account_balance: dec!(1000),
        fees_total: dec!(0),
        tested: false,
        counters: Default::default(),
    }
}

fn settings() -> ScannerSettings {
    ScannerSettings {
        active_market_threshold: dec!(0.1),
        liquidity_threshold: dec!(500),
        top_averages: vec![3, 5, 10],
        fee_pct: dec!(0.06),
    }
}

fn writer() -> ChunkedRetryWriter {
    ChunkedRetryWriter::new(500, 2, Duration::from_millis(1))
}

/// Five rising frames for BTCUSDT, newest first: 110, 108, 106, 104, 102.
async fn rising_market(store: &MemoryStore) {
    for (frame, price) in ["110", "108", "106", "104", "102"].iter().enumerate() {
        store
            .insert_snapshot(MarketSnapshot::new(
                frame_timestamp(BASE, frame),
                vec![InstrumentPrice::new("BTCUSDT", *price)],
            ))
            .await;
    }
    store.set_liquidity("BTCUSDT", "1000").await;
}

fn cycle(store: Arc<MemoryStore>, feed: ScriptedFeed) -> ScanCycle {
    ScanCycle::with_parts(
        store,
        Arc::new(feed),
        settings(),
        writer(),
        Arc::new(FixedClock(OPENED_AT)),
        Arc::new(BypassVolatility),
    )
}

fn engine(store: Arc<MemoryStore>, feed: ScriptedFeed) -> PaperTradeEngine {
    PaperTradeEngine::new(
        Arc::new(feed),
        store.clone(),
        store,
        writer(),
        dec!(0.06),
        Arc::new(FixedClock(OPENED_AT)),
    )
}

#[tokio::test]
async fn eleven_percent_move_is_retained_as_active() {
    let store = Arc::new(MemoryStore::new());
    store
        .insert_snapshot(MarketSnapshot::new(BASE, vec![InstrumentPrice::new("BTCUSDT", "100")]))
        .await;
    store
        .insert_snapshot(MarketSnapshot::new(
            BASE - 300,
            vec![InstrumentPrice::new("BTCUSDT", "90")],
        ))
        .await;

    let summary = cycle(store.clone(), ScriptedFeed::default()).run(BASE).await;

    assert_eq!(summary.active_count, 1);
    let reports = store.activity_reports().await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].pairs_count, 1);
    assert_eq!(reports[0].avg_gain, dec!(11.11));
    assert_eq!(reports[0].top_a_gain, Decimal::ZERO);

    let stats = store.symbol_stats("BTCUSDT").await.unwrap();
    assert_eq!(stats.position_counts[0], 1);
    assert_eq!(stats.position_counts.iter().sum::<u32>(), 1);
}

#[tokio::test]
async fn quiet_frame_writes_no_activity_report() {
    let store = Arc::new(MemoryStore::new());
    for timestamp in [BASE, BASE - 300] {
        store
            .insert_snapshot(MarketSnapshot::new(
                timestamp,
                vec![InstrumentPrice::new("BTCUSDT", "100")],
            ))
            .await;
    }
    store.set_liquidity("BTCUSDT", "1000").await;
    store.add_strategy(strategy("momentum-2-4", 2, 4)).await;

    let summary = cycle(store.clone(), ScriptedFeed::default()).run(BASE).await;

    assert_eq!(summary.snapshot_size, 1);
    assert_eq!(summary.active_count, 0);
    assert!(summary.activity_report.is_none());
    assert!(summary.runs.is_empty());
    assert!(store.activity_reports().await.is_empty());
    assert!(store.symbol_stats("BTCUSDT").await.is_none());
    assert!(store.outcomes().await.is_empty());
}

#[tokio::test]
async fn full_cycle_records_a_win() {
    let store = Arc::new(MemoryStore::new());
    rising_market(&store).await;
    store.add_strategy(strategy("momentum-2-4", 2, 4)).await;

    let feed = ScriptedFeed::default()
        .with_price("BTCUSDT", dec!(100))
        .with_script(
            "BTCUSDT",
            vec![tick("100.5", 1_000), tick("garbage", 2_000), tick("102.5", 3_000)],
        );

    let summary = cycle(store.clone(), feed).run(BASE).await;

    assert_eq!(summary.liquid_count, 1);
    assert_eq!(summary.runs.len(), 1);
    assert_eq!(summary.runs[0].symbol.as_deref(), Some("BTCUSDT"));
    assert!(matches!(summary.runs[0].result, StrategyResult::Traded(_)));

    let outcomes = store.outcomes().await;
    assert_eq!(outcomes.len(), 1);
    let outcome = &outcomes[0];
    assert_eq!(outcome.outcome, OutcomeKind::Win);
    assert_eq!(outcome.percentage_change, dec!(2.5));
    assert_eq!(outcome.elapsed_ms, 3_000);
    // Exit tick time, in epoch seconds.
    assert_eq!(outcome.timestamp, (OPENED_AT + 3_000) / 1_000);
    assert_eq!(outcome.updated_balance, dec!(1023.770369));

    let stored = store.strategy("momentum-2-4").await.unwrap();
    assert_eq!(stored.counters.wins, 1);
    assert_eq!(stored.counters.net_gains, 1);
    assert_eq!(stored.counters.losses, 0);
    assert_eq!(stored.account_balance, dec!(1023.770369));
    assert_eq!(stored.fees_total, dec!(1.214631));
}

#[tokio::test]
async fn failing_strategies_do_not_affect_each_other() {
    let store = Arc::new(MemoryStore::new());
    rising_market(&store).await;
    store.add_strategy(strategy("a-broken-windows", 5, 3)).await;
    store.add_strategy(strategy("b-dead-stream", 2, 4)).await;
    store.add_strategy(strategy("c-healthy", 2, 4)).await;
    let mut done = strategy("d-already-tested", 2, 4);
    done.tested = true;
    store.add_strategy(done).await;

    // The first subscription ends without any tick; the second wins.
    let feed = ScriptedFeed::default()
        .with_price("BTCUSDT", dec!(100))
        .with_script("BTCUSDT", Vec::new())
        .with_script("BTCUSDT", vec![tick("103", 500)]);

    let summary = cycle(store.clone(), feed).run(BASE).await;

    assert_eq!(summary.runs.len(), 3);
    let by_name: HashMap<_, _> = summary
        .runs
        .iter()
        .map(|run| (run.strategy.as_str(), &run.result))
        .collect();
    assert!(matches!(by_name["a-broken-windows"], StrategyResult::Skipped(_)));

    let failed = summary
        .runs
        .iter()
        .filter(|run| matches!(run.result, StrategyResult::Failed(_)))
        .count();
    let traded = summary
        .runs
        .iter()
        .filter(|run| matches!(run.result, StrategyResult::Traded(_)))
        .count();
    assert_eq!((failed, traded), (1, 1));
    assert_eq!(store.outcomes().await.len(), 1);
}

#[tokio::test]
async fn stop_loss_records_a_loss() {
    let store = Arc::new(MemoryStore::new());
    store.add_strategy(strategy("s", 2, 4)).await;
    let feed = ScriptedFeed::default()
        .with_price("ETHUSDT", dec!(100))
        .with_script("ETHUSDT", vec![tick("100.2", 100), tick("99", 200)]);

    let outcome = engine(store.clone(), feed)
        .run(&strategy("s", 2, 4), "ETHUSDT")
        .await
        .unwrap();

    assert_eq!(outcome.outcome, OutcomeKind::Loss);
    assert_eq!(outcome.percentage_change, dec!(-1));
    let stored = store.strategy("s").await.unwrap();
    assert_eq!(stored.counters.losses, 1);
    assert_eq!(stored.counters.net_losses, 1);
    assert_eq!(store.outcomes().await[0].outcome, OutcomeKind::Loss);
}

#[tokio::test]
async fn quiet_market_times_out_with_a_small_gain() {
    let store = Arc::new(MemoryStore::new());
    store.add_strategy(strategy("s", 2, 4)).await;
    let feed = ScriptedFeed::default()
        .with_price("ETHUSDT", dec!(100))
        .with_script("ETHUSDT", vec![tick("100.05", 60_000), tick("100.1", 600_000)]);

    let outcome = engine(store.clone(), feed)
        .run(&strategy("s", 2, 4), "ETHUSDT")
        .await
        .unwrap();

    assert_eq!(outcome.outcome, OutcomeKind::Timeout);
    assert_eq!(outcome.elapsed_ms, 600_000);
    let counters = store.strategy("s").await.unwrap().counters;
    assert_eq!(counters.timeout_gains, 1);
    assert_eq!(counters.timeout_losses, 0);
    // 0.1% does not cover two 0.06% fees.
    assert_eq!(counters.net_losses, 1);
}

#[tokio::test]
async fn missing_opening_price_records_nothing() {
    let store = Arc::new(MemoryStore::new());
    store.add_strategy(strategy("s", 2, 4)).await;

    let result = engine(store.clone(), ScriptedFeed::default())
        .run(&strategy("s", 2, 4), "NOPEUSDT")
        .await;

    assert!(result.is_err());
    assert!(store.outcomes().await.is_empty());
    assert_eq!(store.strategy("s").await.unwrap().counters.total_trades(), 0);
}

#[tokio::test]
async fn transport_failure_mid_trade_records_nothing() {
    let store = Arc::new(MemoryStore::new());
    store.add_strategy(strategy("s", 2, 4)).await;
    let feed = ScriptedFeed::default()
        .with_price("ETHUSDT", dec!(100))
        .with_script(
            "ETHUSDT",
            vec![tick("100.1", 10), Err(ApiError::WebSocket("reset".to_string()))],
        );

    let result = engine(store.clone(), feed)
        .run(&strategy("s", 2, 4), "ETHUSDT")
        .await;

    assert!(result.is_err());
    assert!(store.outcomes().await.is_empty());
}

#[tokio::test]
async fn transient_write_failures_are_retried() {
    let store = Arc::new(MemoryStore::new());
    store.add_strategy(strategy("s", 2, 4)).await;
    store.reject_next_writes(2);
    let feed = ScriptedFeed::default()
        .with_price("ETHUSDT", dec!(100))
        .with_script("ETHUSDT", vec![tick("102", 10)]);

    engine(store.clone(), feed)
        .run(&strategy("s", 2, 4), "ETHUSDT")
        .await
        .unwrap();

    assert_eq!(store.outcomes().await.len(), 1);
    assert_eq!(store.strategy("s").await.unwrap().counters.wins, 1);
}
