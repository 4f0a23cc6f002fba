//! Forex rate cache, sync and alert core.
//!
//! Periodically fetches foreign-exchange rates for a configured set of
//! currency pairs, persists them in a local SQLite cache keyed by pair and
//! normalized UTC date, serves the cache through a fixed set of resource
//! patterns with join-based denormalization, and evaluates one
//! user-configured fluctuation alert against the freshest data.

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod scheduler;
pub mod state;
pub mod sync;

pub use error::{AppError, Result};
