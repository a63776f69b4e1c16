//! # Scanner Engine
//!
//! Orchestrates a scan cycle end to end: filters a recorded snapshot down to
//! liquid, active instruments, then runs every untested strategy concurrently.
//! Each strategy applies its own momentum windows and paper-trades the chosen
//! symbol against the live trade stream.
//!
//! ## Public API
//!
//! - `ScanCycle`: one pass of the pipeline for a five-minute frame.
//! - `StrategyDispatcher`: fork-join over strategies with independent candidate copies.
//! - `PaperTradeEngine`: the trade session state machine and its bookkeeping.
//! - `record_snapshot` / `parse_recorded_prices`: feeding the snapshot store.
//! - `run_every`: the five-minute loop, interruptible mid-cycle.

pub mod clock;
pub mod cycle;
pub mod dispatcher;
pub mod error;
pub mod fees;
pub mod paper_trade;
pub mod recorder;
pub mod schedule;

pub use clock::{Clock, FixedClock, SystemClock};
pub use cycle::{CycleSummary, ScanCycle};
pub use dispatcher::{StrategyDispatcher, StrategyResult, StrategyRun};
pub use error::EngineError;
pub use fees::{FeeOutcome, apply_round_trip_fees};
pub use paper_trade::{
    EXIT_RULES, ExitRule, ExitTargets, PaperTradeEngine, SessionExit, SessionState, TradeSession,
    evaluate_exit, outcome_flags,
};
pub use recorder::{parse_recorded_prices, record_snapshot, replay_files};
pub use schedule::{Stopped, run_every};
