use crate::enums::OutcomeKind;
use crate::error::CoreError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// One instrument's price inside a snapshot.
///
/// The price is kept as the exchange sent it; `percentage_change` is filled in
/// by the enricher and stays `None` when there was no prior price to compare with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentPrice {
    pub symbol: String,
    pub price: String,
    #[serde(default)]
    pub percentage_change: Option<Decimal>,
}

impl InstrumentPrice {
    pub fn new(symbol: impl Into<String>, price: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            price: price.into(),
            percentage_change: None,
        }
    }

    /// Parses the raw price string.
    pub fn decimal_price(&self) -> Result<Decimal, CoreError> {
        Decimal::from_str(self.price.trim())
            .map_err(|e| {
                CoreError::InvalidInput(format!("price of {}", self.symbol), e.to_string())
            })
    }
}

/// A full set of instrument prices captured at one rounded five-minute timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Epoch seconds, aligned to a five-minute boundary.
    pub timestamp: i64,
    pub prices: Vec<InstrumentPrice>,
}

impl MarketSnapshot {
    pub fn new(timestamp: i64, prices: Vec<InstrumentPrice>) -> Self {
        Self { timestamp, prices }
    }

    /// An empty snapshot is how a missing frame is represented.
    pub fn empty(timestamp: i64) -> Self {
        Self {
            timestamp,
            prices: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn get(&self, symbol: &str) -> Option<&InstrumentPrice> {
        self.prices.iter().find(|p| p.symbol == symbol)
    }
}

/// An instrument that passed the activity filter ("gainer").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub symbol: String,
    /// Percentage change against the previous snapshot.
    pub increment_price_gain: Decimal,
    /// Set by the momentum filter only when the symbol is promoted.
    pub sma_price_gain: Option<Decimal>,
    /// Reserved for a future weighted ranking.
    pub weighted_score: Decimal,
}

impl Candidate {
    pub fn new(symbol: impl Into<String>, increment_price_gain: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            increment_price_gain,
            sma_price_gain: None,
            weighted_score: Decimal::ZERO,
        }
    }

    pub fn is_promoted(&self) -> bool {
        self.sma_price_gain.is_some()
    }
}

/// Running tally of a strategy's paper-trade results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounters {
    pub wins: u32,
    pub losses: u32,
    pub timeout_gains: u32,
    pub timeout_losses: u32,
    pub net_gains: u32,
    pub net_losses: u32,
}

impl OutcomeCounters {
    pub fn record(&mut self, flags: &OutcomeFlags) {
        self.wins += u32::from(flags.win);
        self.losses += u32::from(flags.loss);
        self.timeout_gains += u32::from(flags.timeout_gain);
        self.timeout_losses += u32::from(flags.timeout_loss);
        self.net_gains += u32::from(flags.net_gain);
        self.net_losses += u32::from(flags.net_loss);
    }

    pub fn total_trades(&self) -> u32 {
        self.wins + self.losses + self.timeout_gains + self.timeout_losses
    }
}

/// A configured trading strategy and its paper account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub name: String,
    /// Short SMA window, in five-minute frames.
    pub short_window: usize,
    /// Long SMA window, in five-minute frames.
    pub long_window: usize,
    pub momentum_threshold: Decimal,
    pub trade_duration_minutes: i64,
    pub take_profit_pct: Decimal,
    pub stop_loss_pct: Decimal,
    pub account_balance: Decimal,
    pub fees_total: Decimal,
    /// Tested strategies no longer take part in live simulation.
    pub tested: bool,
    #[serde(default)]
    pub counters: OutcomeCounters,
}

/// A partial update of a strategy record. Only fields that are `Some` overwrite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyPatch {
    pub short_window: Option<usize>,
    pub long_window: Option<usize>,
    pub momentum_threshold: Option<Decimal>,
    pub trade_duration_minutes: Option<i64>,
    pub take_profit_pct: Option<Decimal>,
    pub stop_loss_pct: Option<Decimal>,
    pub account_balance: Option<Decimal>,
    pub fees_total: Option<Decimal>,
    pub tested: Option<bool>,
}

impl StrategyPatch {
    pub fn apply(&self, target: &mut StrategyConfig) {
        if let Some(v) = self.short_window {
            target.short_window = v;
        }
        if let Some(v) = self.long_window {
            target.long_window = v;
        }
        if let Some(v) = self.momentum_threshold {
            target.momentum_threshold = v;
        }
        if let Some(v) = self.trade_duration_minutes {
            target.trade_duration_minutes = v;
        }
        if let Some(v) = self.take_profit_pct {
            target.take_profit_pct = v;
        }
        if let Some(v) = self.stop_loss_pct {
            target.stop_loss_pct = v;
        }
        if let Some(v) = self.account_balance {
            target.account_balance = v;
        }
        if let Some(v) = self.fees_total {
            target.fees_total = v;
        }
        if let Some(v) = self.tested {
            target.tested = v;
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Which counters a concluded trade increments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeFlags {
    pub win: bool,
    pub loss: bool,
    pub timeout_gain: bool,
    pub timeout_loss: bool,
    pub net_gain: bool,
    pub net_loss: bool,
}

/// The bookkeeping written back to a strategy after a trade concludes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterUpdate {
    pub strategy_name: String,
    pub flags: OutcomeFlags,
    pub patch: StrategyPatch,
}

impl CounterUpdate {
    pub fn apply_to(&self, strategy: &mut StrategyConfig) {
        strategy.counters.record(&self.flags);
        self.patch.apply(strategy);
    }
}

/// A single trade print from the live feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeTick {
    pub price: String,
    pub trade_time_ms: i64,
}

/// The immutable record of one concluded paper trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub outcome_id: Uuid,
    /// Trade time (epoch seconds) of the tick that closed the position.
    pub timestamp: i64,
    pub strategy_name: String,
    pub symbol: String,
    pub percentage_change: Decimal,
    pub updated_balance: Decimal,
    pub fee: Decimal,
    pub outcome: OutcomeKind,
    pub elapsed_ms: i64,
}

/// Summary of one cycle's activity-filter output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityReport {
    pub timestamp: i64,
    pub pairs_count: usize,
    pub avg_gain: Decimal,
    pub top_a_gain: Decimal,
    pub top_b_gain: Decimal,
    pub top_c_gain: Decimal,
}

/// Number of leading activity positions tracked per symbol.
pub const TRACKED_POSITIONS: usize = 10;

/// A symbol seen at a 0-based position of the cycle's activity list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionHit {
    pub symbol: String,
    pub position: usize,
}

/// How often a symbol has held each tracked activity position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolStats {
    pub symbol: String,
    pub position_counts: Vec<u32>,
}

impl SymbolStats {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            position_counts: vec![0; TRACKED_POSITIONS],
        }
    }

    /// Counts one more appearance at `position`, growing the list if needed.
    pub fn record(&mut self, position: usize) {
        if position >= self.position_counts.len() {
            self.position_counts.resize(position + 1, 0);
        }
        self.position_counts[position] += 1;
    }
}
