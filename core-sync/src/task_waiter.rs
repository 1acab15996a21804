//! Remote task completion.
//!
//! Every mutation of the remote index is acknowledged with a task handle
//! before the change is applied. [`TaskWaiter`] polls the task status at a
//! fixed interval until it reaches a terminal state or the attempt budget
//! runs out, bounding the wait to `poll_interval * max_attempts`.

use bridge_traits::{RemoteIndexClient, TaskHandle, TaskState};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::error::{Result, SyncError};

pub struct TaskWaiter {
    client: Arc<dyn RemoteIndexClient>,
    poll_interval: Duration,
    max_attempts: u32,
}

impl TaskWaiter {
    pub fn new(client: Arc<dyn RemoteIndexClient>, poll_interval: Duration, max_attempts: u32) -> Self {
        Self {
            client,
            poll_interval,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Wait for `handle` to succeed.
    ///
    /// A failed status lookup counts as one attempt and is treated as still
    /// pending.
    ///
    /// # Errors
    ///
    /// - `SyncError::TaskFailed` with the remote-reported reason
    /// - `SyncError::TaskTimeout` when the budget is exhausted without a terminal state
    #[instrument(skip(self), fields(task = %handle))]
    pub async fn wait(&self, handle: &TaskHandle) -> Result<()> {
        for attempt in 1..=self.max_attempts {
            tokio::time::sleep(self.poll_interval).await;

            match self.client.status(handle).await {
                Ok(status) => match status.state {
                    TaskState::Succeeded => {
                        debug!(attempt, "Remote task succeeded");
                        return Ok(());
                    }
                    TaskState::Failed => {
                        let message = status
                            .error
                            .unwrap_or_else(|| "remote task failed without a reason".to_string());
                        return Err(SyncError::TaskFailed {
                            task_uid: handle.task_uid,
                            message,
                        });
                    }
                    TaskState::Pending => {
                        debug!(attempt, "Remote task still pending");
                    }
                },
                Err(e) => {
                    warn!(attempt, error = %e, "Task status lookup failed");
                }
            }
        }

        Err(SyncError::TaskTimeout {
            task_uid: handle.task_uid,
            attempts: self.max_attempts,
        })
    }
}
