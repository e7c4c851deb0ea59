//! Serialized job execution
//!
//! Every mutation of local state goes through the executor: a single
//! worker task drains a bounded channel, so at most one job runs at a
//! time and jobs run in submission order. A failing job is logged and
//! swallowed; the worker never dies because of one. When the channel
//! is full, `submit` waits, which pushes backpressure onto producers.

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::data::EntityId;
use crate::error::{AppError, Result};
use crate::metrics::{JOB_QUEUE_DEPTH, JOBS_EXECUTED_TOTAL};

/// Identifier of a submitted job (ULID)
pub type JobId = EntityId;

type JobAction = Box<dyn FnOnce(JobId) -> BoxFuture<'static, Result<()>> + Send>;

/// A unit of work for the executor
///
/// Completion is recorded in a shared cell that is set exactly once,
/// whether the action succeeded or failed; [`JobHandle`]s observe it.
pub struct Job {
    id: JobId,
    created_at: DateTime<Utc>,
    action: Option<JobAction>,
    completed_at: Arc<OnceLock<DateTime<Utc>>>,
}

impl Job {
    pub fn new<F, Fut>(action: F) -> Self
    where
        F: FnOnce(JobId) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            id: EntityId::new(),
            created_at: Utc::now(),
            action: Some(Box::new(move |id| Box::pin(action(id)))),
            completed_at: Arc::new(OnceLock::new()),
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Observer for this job's completion
    pub fn handle(&self) -> JobHandle {
        JobHandle {
            id: self.id.clone(),
            completed_at: Arc::clone(&self.completed_at),
        }
    }

    fn is_complete(&self) -> bool {
        self.completed_at.get().is_some()
    }

    fn mark_complete(&self) {
        // set() fails if already completed, which is exactly the
        // exactly-once behavior we want
        let _ = self.completed_at.set(Utc::now());
    }
}

/// Cheap clone observers use to poll job completion
#[derive(Clone)]
pub struct JobHandle {
    id: JobId,
    completed_at: Arc<OnceLock<DateTime<Utc>>>,
}

impl JobHandle {
    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn is_complete(&self) -> bool {
        self.completed_at.get().is_some()
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at.get().copied()
    }
}

/// Submit side of the executor
pub struct JobExecutor {
    sender: mpsc::Sender<Job>,
}

impl JobExecutor {
    /// Spawn the worker task and return the executor
    ///
    /// The worker drains remaining queued jobs only until `shutdown`
    /// fires; an in-flight job always runs to completion.
    pub fn start(capacity: usize, shutdown: CancellationToken) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        tokio::spawn(run_worker(receiver, shutdown));
        Self { sender }
    }

    /// Queue a job for execution
    ///
    /// A job that is already complete or has no action left is a
    /// no-op. Waits for channel capacity when the queue is full.
    pub async fn submit(&self, job: Job) -> Result<()> {
        if job.action.is_none() || job.is_complete() {
            tracing::debug!(job_id = %job.id, "Skipping already-completed job");
            return Ok(());
        }

        tracing::debug!(job_id = %job.id, "Job queued, waiting for worker");
        JOB_QUEUE_DEPTH.inc();
        self.sender.send(job).await.map_err(|_| {
            JOB_QUEUE_DEPTH.dec();
            AppError::Internal(anyhow::anyhow!("job executor is shut down"))
        })?;

        Ok(())
    }
}

async fn run_worker(mut receiver: mpsc::Receiver<Job>, shutdown: CancellationToken) {
    loop {
        let job = tokio::select! {
            _ = shutdown.cancelled() => break,
            job = receiver.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        JOB_QUEUE_DEPTH.dec();
        execute(job).await;
    }

    JOB_QUEUE_DEPTH.set(0);
    tracing::info!("Job executor stopped");
}

async fn execute(mut job: Job) {
    let Some(action) = job.action.take() else {
        job.mark_complete();
        return;
    };

    tracing::info!(job_id = %job.id, "Job started");
    let started = Instant::now();

    match action(job.id.clone()).await {
        Ok(()) => {
            JOBS_EXECUTED_TOTAL.with_label_values(&["success"]).inc();
        }
        Err(error) => {
            // The error ends here: one bad job must not stop the worker
            tracing::error!(job_id = %job.id, error = %error, "Job failed");
            JOBS_EXECUTED_TOTAL.with_label_values(&["error"]).inc();
        }
    }

    job.mark_complete();
    tracing::info!(
        job_id = %job.id,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Job finished"
    );
}
