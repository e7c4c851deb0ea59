//! Periodic resync scheduling
//!
//! Waits out the configured interval, then submits a fresh unscoped
//! recent-sync job. The initial sync at startup is submitted by the
//! supervisor, so the first tick here is a full interval in.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::executor::JobExecutor;
use super::reconcile::Engine;
use super::tasks::recent_sync_job;
use crate::search::SearchApi;

pub struct Scheduler<S: SearchApi> {
    engine: Arc<Engine<S>>,
    executor: Arc<JobExecutor>,
    interval: Duration,
}

impl<S: SearchApi> Scheduler<S> {
    pub fn new(engine: Arc<Engine<S>>, executor: Arc<JobExecutor>, interval: Duration) -> Self {
        Self {
            engine,
            executor,
            interval,
        }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Resync scheduler started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }

            let job = recent_sync_job(Arc::clone(&self.engine), None);
            tracing::debug!(job_id = %job.id(), "Submitting scheduled recent sync");
            if let Err(error) = self.executor.submit(job).await {
                tracing::error!(error = %error, "Failed to submit scheduled sync, stopping");
                break;
            }
        }

        tracing::info!("Resync scheduler stopped");
    }
}
