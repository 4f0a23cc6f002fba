//! Rate synchronization pipeline
//!
//! [`engine`] runs the periodic fetch/write/prune cycle, [`alert`] evaluates
//! the configured fluctuation alert after each successful write, and
//! [`currencies`] performs the one-time currency seed load.

pub mod alert;
pub mod currencies;
pub mod engine;
