//! Bookkeeping for automation runs.
//!
//! Cumulative counters persist between runs; every run also leaves a JSON
//! report listing what happened to each file.

pub mod log;
pub mod record;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, RunLog, RunStats, SharedRunLog,
};
pub use record::{FileOutcome, FileRecord, RunReport, SkipReason};
