//! # Scanner Database Crate
//!
//! The persistence boundary of the scanner. Every stage of the pipeline talks to
//! storage through the small collaborator traits in [`store`], so a cycle can run
//! against PostgreSQL in production or against [`MemoryStore`] in tests and
//! replays.
//!
//! ## Public API
//!
//! - `connect` / `run_migrations`: establish the pool and bring the schema up to date.
//! - `DbRepository`: the PostgreSQL implementation of every collaborator trait.
//!   Each call is bounded by a read or write deadline.
//! - `MemoryStore`: an in-process implementation with seeding helpers.
//! - `ChunkedRetryWriter`: splits bulk writes into chunks and retries each one
//!   with a linear backoff.
//! - `DbError`: the error type for everything in this crate.

pub mod connection;
pub mod error;
pub mod memory;
pub mod repository;
pub mod store;
pub mod writer;

pub use connection::{connect, run_migrations};
pub use error::DbError;
pub use memory::MemoryStore;
pub use repository::DbRepository;
pub use store::{
    CounterSink, ReportSink, ScannerStore, SnapshotSink, SnapshotSource, StatsSource,
    StrategySource, SymbolStatsSink,
};
pub use writer::ChunkedRetryWriter;
