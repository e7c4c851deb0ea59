//! Concrete background actions
//!
//! Each action borrows the engine and delegates to one reconciliation
//! entry point. The job constructors wrap a fresh [`Task`] per
//! submission, so every scheduled run gets its own re-entrancy guard.

use std::future::Future;
use std::sync::Arc;

use super::executor::{Job, JobId};
use super::reconcile::Engine;
use super::task::{Task, TaskAction};
use crate::error::Result;
use crate::search::SearchApi;

pub struct RuleImportAction<S: SearchApi> {
    engine: Arc<Engine<S>>,
}

impl<S: SearchApi> TaskAction for RuleImportAction<S> {
    const NAME: &'static str = "rule_import";

    fn execute(&self, _job_id: Option<&JobId>) -> impl Future<Output = Result<()>> + Send {
        self.engine.import_rules()
    }
}

pub struct RecentSyncAction<S: SearchApi> {
    engine: Arc<Engine<S>>,
    /// When set, only this dashboard is synced
    dashboard_id: Option<String>,
}

impl<S: SearchApi> TaskAction for RecentSyncAction<S> {
    const NAME: &'static str = "recent_sync";

    fn execute(&self, _job_id: Option<&JobId>) -> impl Future<Output = Result<()>> + Send {
        self.engine.sync_recent(self.dashboard_id.as_deref())
    }
}

pub struct StreamMessageAction<S: SearchApi> {
    engine: Arc<Engine<S>>,
    raw: String,
}

impl<S: SearchApi> TaskAction for StreamMessageAction<S> {
    const NAME: &'static str = "stream_message";

    fn execute(&self, _job_id: Option<&JobId>) -> impl Future<Output = Result<()>> + Send {
        self.engine.apply_stream_message(&self.raw)
    }
}

/// Job importing the rule list into dashboards
pub fn rule_import_job<S: SearchApi>(engine: Arc<Engine<S>>) -> Job {
    let task = Task::new(RuleImportAction { engine });
    Job::new(move |job_id| async move { task.run(Some(&job_id)).await })
}

/// Job running a recent-sync pass, optionally scoped to one dashboard
pub fn recent_sync_job<S: SearchApi>(engine: Arc<Engine<S>>, dashboard_id: Option<String>) -> Job {
    let task = Task::new(RecentSyncAction {
        engine,
        dashboard_id,
    });
    Job::new(move |job_id| async move { task.run(Some(&job_id)).await })
}

/// Job reconciling one raw stream line
pub fn stream_message_job<S: SearchApi>(engine: Arc<Engine<S>>, raw: String) -> Job {
    let task = Task::new(StreamMessageAction { engine, raw });
    Job::new(move |job_id| async move { task.run(Some(&job_id)).await })
}
