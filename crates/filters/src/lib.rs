//! # Scanner Filter Pipeline
//!
//! The stages that narrow a market snapshot down to trade candidates:
//!
//! 1. [`enrich`] annotates each price with its change against the previous frame.
//! 2. [`activity_filter`] keeps instruments whose change meets the activity cutoff.
//! 3. [`liquidity_filter`] keeps instruments with a sufficient liquidity estimate.
//! 4. [`momentum_filter`] promotes instruments whose short moving average leads the
//!    long one by more than a strategy's threshold.
//! 5. A [`VolatilityFilter`] picks the symbol to trade from the promoted set.
//!
//! Data gaps (missing frames, missing or malformed stats) never fail a stage. The
//! affected instrument is skipped and the skip is logged.

pub mod activity;
pub mod enrich;
pub mod error;
pub mod liquidity;
pub mod momentum;
pub mod volatility;

pub use activity::activity_filter;
pub use enrich::enrich;
pub use error::FilterError;
pub use liquidity::liquidity_filter;
pub use momentum::{MomentumParams, momentum_filter, promoted};
pub use volatility::{BypassVolatility, VolatilityFilter};
