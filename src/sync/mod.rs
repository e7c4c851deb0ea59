//! Background synchronization
//!
//! Everything that keeps local state aligned with the search API:
//! the serialized job executor, the task wrapper, the reconciliation
//! engine, the periodic scheduler and the live stream consumer.

mod content;
mod executor;
mod reconcile;
mod scheduler;
mod stream;
mod task;
mod tasks;

pub use executor::{Job, JobExecutor, JobHandle, JobId};
pub use reconcile::Engine;
pub use scheduler::Scheduler;
pub use stream::StreamConsumer;
pub use task::{Task, TaskAction};
pub use tasks::{recent_sync_job, rule_import_job, stream_message_job};

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::SyncConfig;
use crate::error::Result;
use crate::search::{SearchApi, SearchClient};

/// Bring the background machinery up
///
/// Order matters: rules are imported before anything else runs, the
/// stream starts listening, then an initial backfill is queued and
/// the periodic scheduler takes over.
pub async fn start<S: SearchApi>(
    client: Arc<SearchClient>,
    engine: Arc<Engine<S>>,
    executor: Arc<JobExecutor>,
    sync: &SyncConfig,
    shutdown: CancellationToken,
) -> Result<()> {
    executor.submit(rule_import_job(Arc::clone(&engine))).await?;

    let consumer = StreamConsumer::new(
        client,
        Arc::clone(&engine),
        Arc::clone(&executor),
        sync.reconnect_delay(),
    );
    tokio::spawn(consumer.run(shutdown.clone()));

    executor
        .submit(recent_sync_job(Arc::clone(&engine), None))
        .await?;

    let scheduler = Scheduler::new(engine, executor, sync.resync_interval());
    tokio::spawn(scheduler.run(shutdown));

    Ok(())
}
