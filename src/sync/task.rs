//! Unit-of-work wrapper
//!
//! A [`Task`] pairs an action with a running flag that observers can
//! poll; serialization is the executor's job, not the task's. Errors
//! are logged with the task name attached and then propagated; the
//! flag is cleared on every exit path.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use super::executor::JobId;
use crate::error::Result;

/// Something a background job can execute
pub trait TaskAction: Send + Sync + 'static {
    /// Stable name used in logs
    const NAME: &'static str;

    fn execute(&self, job_id: Option<&JobId>) -> impl Future<Output = Result<()>> + Send;
}

/// An action plus its running flag
pub struct Task<T: TaskAction> {
    action: T,
    running: AtomicBool,
}

impl<T: TaskAction> Task<T> {
    pub fn new(action: T) -> Self {
        Self {
            action,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Execute the wrapped action
    ///
    /// The running flag is set for the duration so observers can see
    /// the task in flight.
    pub async fn run(&self, job_id: Option<&JobId>) -> Result<()> {
        self.running.store(true, Ordering::SeqCst);
        let _guard = RunningGuard(&self.running);

        let job_id_str = job_id.map(|id| id.as_str());
        tracing::info!(task = T::NAME, job_id = job_id_str, "Task started");

        match self.action.execute(job_id).await {
            Ok(()) => {
                tracing::info!(task = T::NAME, job_id = job_id_str, "Task finished");
                Ok(())
            }
            Err(error) => {
                tracing::error!(
                    task = T::NAME,
                    job_id = job_id_str,
                    error = %error,
                    "Task failed"
                );
                Err(error)
            }
        }
    }
}

/// Clears the running flag even when the action panics or errors
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::sync::Arc;
    use std::sync::atomic::AtomicI32;
    use std::time::Duration;

    struct SlowAction {
        executions: Arc<AtomicI32>,
    }

    impl TaskAction for SlowAction {
        const NAME: &'static str = "slow";

        fn execute(&self, _job_id: Option<&JobId>) -> impl Future<Output = Result<()>> + Send {
            async move {
                self.executions.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok(())
            }
        }
    }

    struct FailingAction;

    impl TaskAction for FailingAction {
        const NAME: &'static str = "failing";

        fn execute(&self, _job_id: Option<&JobId>) -> impl Future<Output = Result<()>> + Send {
            async { Err(AppError::Validation("boom".to_string())) }
        }
    }

    #[tokio::test]
    async fn flag_is_visible_while_running_and_runs_are_not_serialized() {
        let executions = Arc::new(AtomicI32::new(0));
        let task = Arc::new(Task::new(SlowAction {
            executions: Arc::clone(&executions),
        }));

        let first = {
            let task = Arc::clone(&task);
            tokio::spawn(async move { task.run(None).await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(task.is_running());

        // The flag is observational only; a second run still executes
        task.run(None).await.unwrap();

        first.await.unwrap().unwrap();
        assert_eq!(executions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn flag_clears_after_success() {
        let task = Task::new(SlowAction {
            executions: Arc::new(AtomicI32::new(0)),
        });

        task.run(None).await.unwrap();
        assert!(!task.is_running());
    }

    #[tokio::test]
    async fn error_propagates_and_flag_clears() {
        let task = Task::new(FailingAction);

        let result = task.run(None).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(!task.is_running());

        // Runnable again after the failure
        let result = task.run(None).await;
        assert!(result.is_err());
    }
}
