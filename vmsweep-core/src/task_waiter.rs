//! Blocking wait on a batch of inventory tasks
//!
//! [`TaskWaiter::wait_for_tasks`] registers one property filter over the
//! submitted tasks and follows the incremental update stream until every task
//! has reported `success`, or until the first task reports `error`.
//!
//! ```text
//!   create_filter(tasks)
//!          │
//!          ▼
//!   ┌──────────────────────────────┐
//!   │ wait_for_updates(version)    │◄───────────┐
//!   └──────────────────────────────┘            │
//!          │ for each info / info.state change  │
//!          ▼                                    │
//!   success ─► remove from pending ─ pending? ──┘
//!   error   ─► TaskFailed
//!          │
//!          ▼
//!   destroy_filter (every exit path)
//! ```
//!
//! The only suspension point is `wait_for_updates`. There is no polling
//! interval and no timeout; a stream that never delivers the terminal state
//! keeps the caller waiting.

use std::collections::HashSet;
use tracing::{debug, trace, warn};

use crate::error::{SweepError, SweepResult};
use crate::inventory::InventoryClient;
use crate::types::{
    FilterSpec, PropertyChange, PropertyValue, TaskFault, TaskId, TaskState, UpdateVersion,
    INFO_PROPERTY, INFO_STATE_PROPERTY,
};

/// Waits for inventory tasks to reach a terminal state
pub struct TaskWaiter<'a, C: ?Sized> {
    client: &'a C,
}

impl<'a, C> TaskWaiter<'a, C>
where
    C: InventoryClient + ?Sized,
{
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Return once every task has succeeded, or with
    /// [`SweepError::TaskFailed`] for the first task observed in error.
    ///
    /// Duplicate handles are collapsed. An empty batch returns immediately
    /// without touching the inventory.
    pub async fn wait_for_tasks(&self, tasks: &[TaskId]) -> SweepResult<()> {
        let mut pending: HashSet<TaskId> = tasks.iter().cloned().collect();
        if pending.is_empty() {
            return Ok(());
        }

        let filter = self
            .client
            .create_filter(FilterSpec::for_tasks(pending.iter().cloned()))
            .await?;
        debug!(filter = %filter, tasks = pending.len(), "Watching tasks");

        let outcome = self.follow_updates(&mut pending).await;
        let teardown = self.client.destroy_filter(&filter).await;

        match (outcome, teardown) {
            (Ok(()), teardown) => teardown,
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(teardown_err)) => {
                warn!(
                    filter = %filter,
                    error = %teardown_err,
                    "Failed to release property filter after task wait failed"
                );
                Err(err)
            }
        }
    }

    async fn follow_updates(&self, pending: &mut HashSet<TaskId>) -> SweepResult<()> {
        let mut version: Option<UpdateVersion> = None;

        while !pending.is_empty() {
            let update = self.client.wait_for_updates(version.as_ref()).await?;
            trace!(version = %update.version, objects = update.objects.len(), "Received update set");

            for object in &update.objects {
                for change in &object.changes {
                    let Some((state, fault)) = observed_state(change) else {
                        trace!(task = %object.task, property = %change.name, "Ignoring property change");
                        continue;
                    };

                    if !pending.contains(&object.task) {
                        continue;
                    }

                    match state {
                        TaskState::Success => {
                            pending.remove(&object.task);
                            debug!(task = %object.task, remaining = pending.len(), "Task succeeded");
                        }
                        TaskState::Error => {
                            let fault = match fault {
                                Some(fault) => fault.clone(),
                                None => self.fetch_fault(&object.task).await,
                            };
                            debug!(task = %object.task, fault = %fault, "Task failed");
                            return Err(SweepError::task_failed(object.task.clone(), fault));
                        }
                        TaskState::Queued | TaskState::Running => {}
                    }
                }
            }

            version = Some(update.version);
        }

        Ok(())
    }

    /// A bare `info.state` change carries no error payload; read it from the
    /// task itself. The task has failed either way, so a missing payload or a
    /// failed lookup yields a generic fault.
    async fn fetch_fault(&self, task: &TaskId) -> TaskFault {
        let fault = match self.client.task_info(task).await {
            Ok(info) => info.error,
            Err(e) => {
                warn!(task = %task, error = %e, "Failed to read fault of failed task");
                None
            }
        };
        fault.unwrap_or_else(|| {
            TaskFault::new("UnknownFault", format!("task {} reported an error without details", task))
        })
    }
}

/// State carried by a task-info change, if the change has a recognised shape
fn observed_state(change: &PropertyChange) -> Option<(TaskState, Option<&TaskFault>)> {
    match (change.name.as_str(), &change.value) {
        (INFO_PROPERTY, PropertyValue::TaskInfo(info)) => Some((info.state, info.error.as_ref())),
        (INFO_STATE_PROPERTY, PropertyValue::TaskState(state)) => Some((*state, None)),
        _ => None,
    }
}
