//! Periodic sync driver
//!
//! Owns one background task that runs a sync cycle immediately on start and
//! then on a fixed interval. A [`SyncTrigger`] wakes the task early for a
//! manual "sync now"; there is no retry inside a cycle, the next interval (or
//! the next trigger) is the retry.

use crate::sync::engine::SyncEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Handle for requesting an immediate sync cycle
#[derive(Clone)]
pub struct SyncTrigger {
    notify: Arc<Notify>,
}

impl SyncTrigger {
    /// Wake the scheduler without waiting out the interval.
    pub fn sync_now(&self) {
        self.notify.notify_one();
    }
}

/// Periodic driver for the sync engine
pub struct SyncScheduler {
    engine: Arc<SyncEngine>,
    interval: Duration,
    notify: Arc<Notify>,
}

impl SyncScheduler {
    pub fn new(engine: Arc<SyncEngine>, interval: Duration) -> Self {
        Self {
            engine,
            interval,
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn trigger(&self) -> SyncTrigger {
        SyncTrigger {
            notify: self.notify.clone(),
        }
    }

    /// Spawn the background loop. Aborting the returned handle stops it; a
    /// cycle already writing runs to completion on the spawned task.
    pub fn start(self) -> JoinHandle<()> {
        let engine = self.engine;
        let interval = self.interval;
        let notify = self.notify;

        tokio::spawn(async move {
            tracing::info!("Sync scheduler started, interval {:?}", interval);
            loop {
                engine.run_cycle().await;

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = notify.notified() => {
                        tracing::info!("Manual sync requested");
                    }
                }
            }
        })
    }
}
