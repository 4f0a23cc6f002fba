//! Shared application state

use crate::config::ConfigStore;
use crate::db::ForexDb;
use crate::error::Result;
use crate::events::EventBus;
use std::fs;
use std::path::Path;
use std::sync::Arc;

const DB_FILE: &str = "forex.db";

/// Everything long-lived, wired together once at startup
pub struct AppState {
    pub db: Arc<ForexDb>,
    pub config: Arc<ConfigStore>,
    pub events: EventBus,
}

impl AppState {
    /// Build the state from a data directory, creating it if needed.
    pub fn new(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)?;

        let events = EventBus::new();
        let db = Arc::new(ForexDb::new(&data_dir.join(DB_FILE), events.clone())?);
        let config = Arc::new(ConfigStore::open(data_dir)?);

        Ok(Self { db, config, events })
    }
}
