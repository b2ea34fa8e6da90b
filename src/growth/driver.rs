//! Poll loop finishing processing growths once their tasks are ready

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::engine::GrowthEngine;
use super::GrowthState;
use crate::config::TaskSettings;
use crate::error::{Error, Result};

// A missing growth or organism only affects that growth
fn stops_driver(error: &Error) -> bool {
    error.is_storage() && !error.is_not_found()
}

/// Counts of one or more driver passes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverReport {
    pub begun: usize,
    /// Growths whose `begin` was refused; they stay in their state
    pub rejected: usize,
    pub finished: usize,
    pub failed: usize,
    pub pending: usize,
    pub ticks: usize,
}

/// Repeatedly polls PROCESSING growths and finishes the ready ones.
///
/// A growth whose task failed ends in ERROR and is counted, and a growth that
/// cannot begin is counted as rejected. The loop continues with the others in
/// both cases. Storage errors stop the loop.
pub struct GrowthDriver {
    engine: Arc<GrowthEngine>,
    poll_interval: Duration,
}

impl GrowthDriver {
    pub fn new(engine: Arc<GrowthEngine>) -> Self {
        Self {
            engine,
            poll_interval: TaskSettings::default().poll_interval,
        }
    }

    pub fn with_settings(mut self, settings: &TaskSettings) -> Self {
        self.poll_interval = settings.poll_interval;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Begin every NEW and RETRY growth
    pub async fn begin_pending(&self) -> Result<DriverReport> {
        let mut report = DriverReport::default();
        for state in [GrowthState::New, GrowthState::Retry] {
            for growth in self.engine.list(state).await? {
                match self.engine.begin_by_id(growth.id).await {
                    Ok(_) => report.begun += 1,
                    Err(e) if stops_driver(&e) => return Err(e),
                    Err(e) => {
                        warn!(growth = growth.id, "Growth cannot begin: {}", e);
                        report.rejected += 1;
                    }
                }
            }
        }
        Ok(report)
    }

    /// One pass over the processing growths
    pub async fn tick(&self) -> Result<DriverReport> {
        let mut report = DriverReport {
            ticks: 1,
            ..DriverReport::default()
        };

        for growth in self.engine.list(GrowthState::Processing).await? {
            if !self.engine.is_ready(&growth).await? {
                report.pending += 1;
                continue;
            }
            match self.engine.finish_by_id(growth.id).await {
                Ok((growth, _)) => {
                    debug!(growth = growth.id, state = %growth.state(), "Driver finished growth");
                    report.finished += 1;
                }
                Err(e) if e.is_processor() => {
                    warn!(growth = growth.id, "Growth failed: {}", e);
                    report.failed += 1;
                }
                Err(e) if stops_driver(&e) => return Err(e),
                Err(e) => {
                    warn!(growth = growth.id, "Growth cannot finish: {}", e);
                    report.rejected += 1;
                }
            }
        }
        Ok(report)
    }

    /// Begin pending growths, then poll until none is processing.
    ///
    /// Stops after `max_ticks` passes when given; growths still processing are
    /// reported as pending.
    pub async fn run(&self, max_ticks: Option<usize>) -> Result<DriverReport> {
        let mut total = self.begin_pending().await?;

        loop {
            let report = self.tick().await?;
            total.finished += report.finished;
            total.rejected += report.rejected;
            total.failed += report.failed;
            total.pending = report.pending;
            total.ticks += 1;

            if report.pending == 0 || max_ticks.is_some_and(|max| total.ticks >= max) {
                break;
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        info!(
            begun = total.begun,
            rejected = total.rejected,
            finished = total.finished,
            failed = total.failed,
            pending = total.pending,
            "Driver settled"
        );
        Ok(total)
    }
}
