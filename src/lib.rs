// ---------------------------------------------------------------------------
// simrec-engine -- in-memory probability-vector similarity engine
// ---------------------------------------------------------------------------
//
// Stores dense and sparse probability vectors under named coordinate
// bases and keeps top-K nearest-neighbor recommendation lists fresh as
// vectors change. The engine serializes all writes per basis through one
// owned worker thread, answers reads from a bounded pool, and snapshots
// every basis to a dump file on a timer.
// ---------------------------------------------------------------------------

pub mod basis;
pub mod catalog;
pub mod config;
pub mod cron;
pub mod engine;
pub mod error;
pub mod events;
pub mod executor;
pub mod persistence;
pub mod protocol;
pub mod recommendation;
pub mod scoring;
pub mod server;
pub mod store;
pub mod transport;
pub mod types;
pub mod validate;
pub mod vectorset;

pub use config::{BasisOptions, EngineConfig};
pub use engine::Engine;
pub use error::EngineError;
pub use events::{RecommendationListener, StoreListener, VectorSetListener};
pub use types::{Callback, Kind, Reply};
