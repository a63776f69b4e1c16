//! # Scanner Analytics
//!
//! Summary statistics over the activity filter's output: the per-cycle activity
//! report and the per-symbol position hits behind the symbol stats.
//!
//! ## Architectural Principles
//!
//! - **Pure Logic:** No knowledge of storage or the exchange. It depends only on
//!   `core-types`.
//! - **Stateless Calculation:** `AnalyticsEngine` takes candidates in and hands an
//!   `ActivityReport` back. Persisting it is the caller's job.

pub mod engine;
pub mod error;
pub mod positions;

pub use engine::{AnalyticsEngine, average_gain};
pub use error::AnalyticsError;
pub use positions::position_hits;
