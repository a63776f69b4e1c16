use crate::clock::Clock;
use crate::error::EngineError;
use crate::fees::apply_round_trip_fees;
use api_client::PriceFeed;
use core_types::{
    CounterUpdate, OutcomeFlags, OutcomeKind, StrategyConfig, StrategyPatch, TradeOutcome,
    percentage_change,
};
use database::{ChunkedRetryWriter, CounterSink, DbError, ReportSink};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Lifecycle of a single paper trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Opening,
    Listening,
    Won,
    Lost,
    TimedOut,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Won | Self::Lost | Self::TimedOut)
    }

    pub fn outcome(self) -> Option<OutcomeKind> {
        match self {
            Self::Won => Some(OutcomeKind::Win),
            Self::Lost => Some(OutcomeKind::Loss),
            Self::TimedOut => Some(OutcomeKind::Timeout),
            Self::Opening | Self::Listening => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitTargets {
    pub take_profit_price: Decimal,
    pub stop_loss_price: Decimal,
    /// Epoch milliseconds.
    pub timeout_at: i64,
}

impl ExitTargets {
    pub fn new(opening_price: Decimal, opened_at: i64, strategy: &StrategyConfig) -> Self {
        let hundred = Decimal::ONE_HUNDRED;
        Self {
            take_profit_price: opening_price * (Decimal::ONE + strategy.take_profit_pct / hundred),
            stop_loss_price: opening_price * (Decimal::ONE - strategy.stop_loss_pct / hundred),
            timeout_at: opened_at + strategy.trade_duration_minutes * 60_000,
        }
    }
}

/// A single exit condition and the state it leads to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitRule {
    TakeProfit,
    StopLoss,
    Timeout,
}

/// Exit rules in evaluation order. The first rule that holds on a tick wins.
pub const EXIT_RULES: [ExitRule; 3] = [ExitRule::TakeProfit, ExitRule::StopLoss, ExitRule::Timeout];

impl ExitRule {
    pub fn is_met(self, targets: &ExitTargets, price: Decimal, trade_time_ms: i64) -> bool {
        match self {
            Self::TakeProfit => price >= targets.take_profit_price,
            Self::StopLoss => price <= targets.stop_loss_price,
            Self::Timeout => trade_time_ms >= targets.timeout_at,
        }
    }

    pub fn terminal_state(self) -> SessionState {
        match self {
            Self::TakeProfit => SessionState::Won,
            Self::StopLoss => SessionState::Lost,
            Self::Timeout => SessionState::TimedOut,
        }
    }
}

/// The first rule in [`EXIT_RULES`] satisfied by this tick, if any.
pub fn evaluate_exit(
    targets: &ExitTargets,
    price: Decimal,
    trade_time_ms: i64,
) -> Option<ExitRule> {
    EXIT_RULES
        .into_iter()
        .find(|rule| rule.is_met(targets, price, trade_time_ms))
}

/// An open simulated position.
#[derive(Debug, Clone)]
pub struct TradeSession {
    pub symbol: String,
    pub strategy_name: String,
    pub opening_price: Decimal,
    pub opened_at: i64,
    pub targets: ExitTargets,
    state: SessionState,
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionExit {
    pub state: SessionState,
    pub price: Decimal,
    pub trade_time_ms: i64,
}

impl TradeSession {
    pub fn open(
        strategy: &StrategyConfig,
        symbol: &str,
        opening_price: Decimal,
        opened_at: i64,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            strategy_name: strategy.name.clone(),
            opening_price,
            opened_at,
            targets: ExitTargets::new(opening_price, opened_at, strategy),
            state: SessionState::Opening,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn start_listening(&mut self) {
        if self.state == SessionState::Opening {
            self.state = SessionState::Listening;
        }
    }

    /// Feeds one tick. Returns the exit once a terminal state is reached; ticks
    /// after that are ignored.
    pub fn on_tick(&mut self, price: Decimal, trade_time_ms: i64) -> Option<SessionExit> {
        if self.state != SessionState::Listening {
            return None;
        }
        let rule = evaluate_exit(&self.targets, price, trade_time_ms)?;
        self.state = rule.terminal_state();
        Some(SessionExit {
            state: self.state,
            price,
            trade_time_ms,
        })
    }
}

/// Flags for the strategy counters. Timeouts are split by the sign of the move;
/// a flat timeout sets neither timeout flag.
pub fn outcome_flags(kind: OutcomeKind, change_pct: Decimal, net_gain: bool) -> OutcomeFlags {
    let timeout = kind == OutcomeKind::Timeout;
    OutcomeFlags {
        win: kind == OutcomeKind::Win,
        loss: kind == OutcomeKind::Loss,
        timeout_gain: timeout && change_pct > Decimal::ZERO,
        timeout_loss: timeout && change_pct < Decimal::ZERO,
        net_gain,
        net_loss: !net_gain,
    }
}

/// Runs paper trades against a live feed and persists their results.
pub struct PaperTradeEngine {
    feed: Arc<dyn PriceFeed>,
    reports: Arc<dyn ReportSink>,
    counters: Arc<dyn CounterSink>,
    writer: ChunkedRetryWriter,
    fee_pct: Decimal,
    clock: Arc<dyn Clock>,
}

impl PaperTradeEngine {
    pub fn new(
        feed: Arc<dyn PriceFeed>,
        reports: Arc<dyn ReportSink>,
        counters: Arc<dyn CounterSink>,
        writer: ChunkedRetryWriter,
        fee_pct: Decimal,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            feed,
            reports,
            counters,
            writer,
            fee_pct,
            clock,
        }
    }

    /// Opens a position on `symbol` for `strategy`, follows the trade stream
    /// until an exit rule fires, then records the outcome and counters.
    ///
    /// A failed opening-price lookup or a broken stream ends the session with an
    /// error and nothing is recorded.
    pub async fn run(
        &self,
        strategy: &StrategyConfig,
        symbol: &str,
    ) -> Result<TradeOutcome, EngineError> {
        let opening_price = self.feed.latest_price(symbol).await?;
        if opening_price <= Decimal::ZERO {
            return Err(EngineError::InvalidOpeningPrice {
                symbol: symbol.to_string(),
                price: opening_price,
            });
        }

        let mut session = TradeSession::open(strategy, symbol, opening_price, self.clock.now_ms());
        tracing::info!(
            strategy = %strategy.name,
            symbol,
            %opening_price,
            take_profit = %session.targets.take_profit_price,
            stop_loss = %session.targets.stop_loss_price,
            timeout_at = session.targets.timeout_at,
            "Paper trade opened."
        );

        let exit = self.listen(&mut session).await?;
        let (outcome, net_gain) = self.settle(strategy, &session, exit)?;
        self.persist(strategy, &outcome, net_gain).await?;
        Ok(outcome)
    }

    async fn listen(&self, session: &mut TradeSession) -> Result<SessionExit, EngineError> {
        let mut stream = self.feed.subscribe_trades(&session.symbol).await?;
        session.start_listening();

        let result = loop {
            match stream.next().await {
                Some(Ok(tick)) => {
                    let Ok(price) = Decimal::from_str(tick.price.trim()) else {
                        tracing::warn!(
                            symbol = %session.symbol,
                            price = %tick.price,
                            "Unparsable tick price, skipping."
                        );
                        continue;
                    };
                    if let Some(exit) = session.on_tick(price, tick.trade_time_ms) {
                        break Ok(exit);
                    }
                }
                Some(Err(e)) => {
                    tracing::error!(
                        symbol = %session.symbol,
                        strategy = %session.strategy_name,
                        error = %e,
                        "Trade stream failed."
                    );
                    break Err(EngineError::ApiClient(e));
                }
                None => {
                    tracing::error!(
                        symbol = %session.symbol,
                        strategy = %session.strategy_name,
                        "Trade stream ended."
                    );
                    break Err(EngineError::StreamEnded(session.symbol.clone()));
                }
            }
        };

        stream.close().await;
        result
    }

    fn settle(
        &self,
        strategy: &StrategyConfig,
        session: &TradeSession,
        exit: SessionExit,
    ) -> Result<(TradeOutcome, bool), EngineError> {
        let kind = exit
            .state
            .outcome()
            .ok_or_else(|| EngineError::StreamEnded(session.symbol.clone()))?;
        let change = percentage_change(session.opening_price, exit.price)?;
        let fees = apply_round_trip_fees(strategy.account_balance, change, self.fee_pct);

        let outcome = TradeOutcome {
            outcome_id: Uuid::new_v4(),
            timestamp: exit.trade_time_ms.div_euclid(1000),
            strategy_name: session.strategy_name.clone(),
            symbol: session.symbol.clone(),
            percentage_change: change,
            updated_balance: fees.final_balance,
            fee: fees.fees_paid,
            outcome: kind,
            elapsed_ms: (exit.trade_time_ms - session.opened_at).max(0),
        };

        tracing::info!(
            strategy = %outcome.strategy_name,
            symbol = %outcome.symbol,
            outcome = %outcome.outcome,
            change = %outcome.percentage_change,
            balance = %outcome.updated_balance,
            "Paper trade closed."
        );
        Ok((outcome, fees.net_gain))
    }

    async fn persist(
        &self,
        strategy: &StrategyConfig,
        outcome: &TradeOutcome,
        net_gain: bool,
    ) -> Result<(), EngineError> {
        let reports = self.reports.as_ref();
        self.writer
            .write_one(outcome, move |batch: Vec<TradeOutcome>| async move {
                for record in &batch {
                    reports.write_trade_outcome(record).await?;
                }
                Ok::<(), DbError>(())
            })
            .await?;

        let update = CounterUpdate {
            strategy_name: strategy.name.clone(),
            flags: outcome_flags(outcome.outcome, outcome.percentage_change, net_gain),
            patch: StrategyPatch {
                account_balance: Some(outcome.updated_balance),
                fees_total: Some(strategy.fees_total + outcome.fee),
                ..Default::default()
            },
        };

        let counters = self.counters.as_ref();
        self.writer
            .write_one(&update, move |batch: Vec<CounterUpdate>| async move {
                for record in &batch {
                    counters.update_counters(record).await?;
                }
                Ok::<(), DbError>(())
            })
            .await?;
        Ok(())
    }
}
