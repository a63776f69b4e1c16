pub mod enums;
pub mod error;
pub mod math;
pub mod structs;
pub mod time;

// Re-export the core types to provide a clean public API.
pub use enums::OutcomeKind;
pub use error::CoreError;
pub use math::percentage_change;
pub use structs::{
    ActivityReport, Candidate, CounterUpdate, InstrumentPrice, MarketSnapshot, OutcomeCounters,
    OutcomeFlags, PositionHit, StrategyConfig, StrategyPatch, SymbolStats, TRACKED_POSITIONS,
    TradeOutcome, TradeTick,
};
pub use time::{FIVE_MINUTES, frame_timestamp, previous_frame, round_to_five_minutes};
