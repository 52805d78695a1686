#![forbid(unsafe_code)]

//! Core domain model and decision logic for the Repcoach system.
//!
//! This crate provides:
//! - Domain types (logged sessions, snapshots, targets, planned exercises)
//! - Token-bucket admission control
//! - Progression engine (snapshot computation and target prescription)
//! - Session adapter (constraint-driven plan rewriting)
//! - Persistence (journal, CSV archive, snapshot store)

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod limiter;
pub mod progression;
pub mod engine;
pub mod adapter;
pub mod journal;
pub mod history;
pub mod archive;
pub mod store;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use limiter::RateLimiter;
pub use progression::{compute_snapshots, normalize};
pub use engine::pick_target;
pub use adapter::{adapt, adapt_with_rulebook, build_default_rulebook, default_rulebook};
pub use journal::{JsonlSink, LogSink};
pub use history::load_recent_logs;
pub use store::SnapshotStore;
