//! Sweep scheduling engine.
//!
//! Spawns one tokio task per configured subnet, each sweeping at its own
//! interval, plus an optional companion status refresh loop. A semaphore
//! limits how many sweeps run at once.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::time::{interval, Duration};

use crate::companion::{self, PairedDeviceSource};
use crate::config::{DiscoverConfig, SubnetSchedule};
use crate::error::Result;
use crate::sweep::Sweeper;

/// Periodic sweeps for multiple subnets.
pub struct SweepScheduler {
    config: DiscoverConfig,
    sweeper: Sweeper,
    companions: Option<Arc<dyn PairedDeviceSource>>,
    concurrency: Arc<Semaphore>,
}

impl SweepScheduler {
    pub fn new(config: DiscoverConfig, sweeper: Sweeper) -> Self {
        let concurrency = Arc::new(Semaphore::new(config.max_concurrent_sweeps.max(1)));
        Self {
            config,
            sweeper,
            companions: None,
            concurrency,
        }
    }

    /// Also refresh companion status every `companion_refresh_secs`.
    pub fn with_companions(mut self, source: Arc<dyn PairedDeviceSource>) -> Self {
        self.companions = Some(source);
        self
    }

    /// Run until every task ends or the runtime shuts down.
    pub async fn run(&self) -> Result<()> {
        let mut handles = Vec::new();

        for schedule in &self.config.schedules {
            if !schedule.enabled {
                tracing::info!(cidr = %schedule.cidr, "Subnet disabled, skipping");
                continue;
            }

            let sweeper = self.sweeper.clone();
            let schedule = schedule.clone();
            let semaphore = self.concurrency.clone();

            handles.push(tokio::spawn(async move {
                run_subnet_loop(sweeper, schedule, semaphore).await;
            }));
        }

        if let (Some(source), Some(secs)) =
            (self.companions.clone(), self.config.companion_refresh_secs)
        {
            let sweeper = self.sweeper.clone();
            handles.push(tokio::spawn(async move {
                run_companion_loop(source, sweeper, Duration::from_secs(secs.max(1))).await;
            }));
        }

        tracing::info!(task_count = handles.len(), "Scheduler started");

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Scheduled task panicked");
            }
        }

        Ok(())
    }
}

async fn run_subnet_loop(sweeper: Sweeper, schedule: SubnetSchedule, semaphore: Arc<Semaphore>) {
    let mut ticker = interval(Duration::from_secs(schedule.interval_secs.max(1)));

    loop {
        ticker.tick().await;

        tracing::info!(cidr = %schedule.cidr, "Scheduled sweep triggered");

        let Ok(_permit) = semaphore.acquire().await else {
            tracing::error!(cidr = %schedule.cidr, "Sweep semaphore closed, stopping");
            return;
        };

        if let Err(e) = sweeper.probe_range(&schedule.cidr).await {
            tracing::error!(cidr = %schedule.cidr, error = %e, "Scheduled sweep failed");
        }
    }
}

async fn run_companion_loop(
    source: Arc<dyn PairedDeviceSource>,
    sweeper: Sweeper,
    every: Duration,
) {
    let mut ticker = interval(every);

    loop {
        ticker.tick().await;

        if let Err(e) = companion::refresh_status(source.as_ref(), sweeper.store().as_ref()).await
        {
            tracing::warn!(error = %e, "Companion status refresh failed");
        }
    }
}
