//! Background timer that runs automation passes.
//!
//! One task per process. Each tick awaits a full pass before waiting for the
//! next tick, so passes never overlap.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use fp_core::error::FpResult;

use crate::automation::{AutomationService, PassReport};

/// Handle for stopping a running scheduler.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Ask the loop to stop and wait for the current pass to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!("automation scheduler task ended abnormally: {e}");
        }
    }
}

/// Repeating automation pass.
pub struct AutomationScheduler {
    automation: Arc<RwLock<AutomationService>>,
    poll_interval: Duration,
}

impl AutomationScheduler {
    pub fn new(automation: Arc<RwLock<AutomationService>>, poll_interval: Duration) -> Self {
        Self {
            automation,
            poll_interval,
        }
    }

    /// Spawn the loop on the tokio runtime.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown, rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            self.start(rx).await;
        });
        SchedulerHandle { shutdown, task }
    }

    async fn start(&self, mut shutdown: watch::Receiver<bool>) {
        info!("starting automation scheduler with interval {:?}", self.poll_interval);

        let mut interval = interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        error!("automation pass failed: {e}");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("automation scheduler stopping");
                        return;
                    }
                }
            }
        }
    }

    /// Run a single pass now.
    pub async fn tick(&self) -> FpResult<PassReport> {
        let automation = self.automation.read().await;
        let report = automation.run_pass(Utc::now()).await?;
        debug!(
            "automation tick: {} sent, {} failed",
            report.sent(),
            report.failed()
        );
        Ok(report)
    }
}
