// Property-based tests for the task waiter's handling of update interleavings

use proptest::prelude::*;
use vmsweep_core::error::SweepError;
use vmsweep_core::task_waiter::TaskWaiter;
use vmsweep_core::test_helpers::ScriptedInventory;
use vmsweep_core::types::{
    ObjectUpdate, PropertyChange, TaskFault, TaskId, TaskInfo, TaskState, UpdateSet,
    UpdateVersion,
};

/// One change for one task, as either the full info record or the bare state
#[derive(Debug, Clone)]
struct Event {
    task: usize,
    state: TaskState,
    coarse: bool,
}

fn task_id(index: usize) -> TaskId {
    TaskId::new(format!("task-{}", index))
}

fn fault_for(index: usize) -> TaskFault {
    TaskFault::new("SystemError", format!("task {} exploded", index))
}

fn to_change(event: &Event) -> PropertyChange {
    if event.coarse {
        let mut info = TaskInfo::queued(task_id(event.task), "PropertyTest", None);
        info.state = event.state;
        if event.state == TaskState::Error {
            info.error = Some(fault_for(event.task));
        }
        PropertyChange::info(info)
    } else {
        PropertyChange::state(event.state)
    }
}

// Per-task histories: some non-terminal states, then a coarse-or-fine final change
fn history_strategy() -> impl Strategy<Value = (Vec<(bool, bool)>, bool)> {
    (prop::collection::vec((any::<bool>(), any::<bool>()), 0..4), any::<bool>())
}

/// Merge per-task histories using `picks`, then cut into batches of 1..=3
fn interleave(
    histories: &[(Vec<(bool, bool)>, bool)],
    terminal: impl Fn(usize) -> TaskState,
    picks: &[usize],
    batch_sizes: &[usize],
) -> (Vec<UpdateSet>, Vec<Event>) {
    let mut queues: Vec<Vec<Event>> = histories
        .iter()
        .enumerate()
        .map(|(task, (steps, final_coarse))| {
            let mut events: Vec<Event> = steps
                .iter()
                .map(|(running, coarse)| Event {
                    task,
                    state: if *running { TaskState::Running } else { TaskState::Queued },
                    coarse: *coarse,
                })
                .collect();
            events.push(Event {
                task,
                state: terminal(task),
                coarse: *final_coarse,
            });
            events.reverse();
            events
        })
        .collect();

    let mut merged = Vec::new();
    let mut pick = picks.iter().cycle();
    loop {
        let live: Vec<usize> = (0..queues.len()).filter(|i| !queues[*i].is_empty()).collect();
        if live.is_empty() {
            break;
        }
        let chosen = live[pick.next().copied().unwrap_or(0) % live.len()];
        if let Some(event) = queues[chosen].pop() {
            merged.push(event);
        }
    }

    let mut batches = Vec::new();
    let mut sizes = batch_sizes.iter().cycle();
    let mut rest = merged.as_slice();
    while !rest.is_empty() {
        let size = (*sizes.next().unwrap_or(&1)).clamp(1, rest.len());
        let (batch, tail) = rest.split_at(size);
        batches.push(UpdateSet {
            version: UpdateVersion::new((batches.len() + 1).to_string()),
            objects: batch
                .iter()
                .map(|event| ObjectUpdate {
                    task: task_id(event.task),
                    changes: vec![to_change(event)],
                })
                .collect(),
        });
        rest = tail;
    }

    (batches, merged)
}

fn run<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime")
        .block_on(future)
}

proptest! {
    // Property: every task reaching success completes the wait, whatever the
    // interleaving and field granularity
    #[test]
    fn test_all_success_completes(
        histories in prop::collection::vec(history_strategy(), 1..6),
        picks in prop::collection::vec(0usize..16, 1..24),
        batch_sizes in prop::collection::vec(1usize..=3, 1..8),
    ) {
        let (batches, _) = interleave(&histories, |_| TaskState::Success, &picks, &batch_sizes);
        let tasks: Vec<TaskId> = (0..histories.len()).map(task_id).collect();
        let inventory = ScriptedInventory::new(batches);

        let result = run(TaskWaiter::new(&inventory).wait_for_tasks(&tasks));

        prop_assert!(result.is_ok(), "unexpected failure: {:?}", result);
        prop_assert_eq!(inventory.remaining_updates(), 0);
        prop_assert_eq!(inventory.filters_created(), 1);
        prop_assert_eq!(inventory.filters_destroyed(), 1);
        prop_assert_eq!(inventory.filter_specs()[0].objects.len(), tasks.len());
    }

    // Property: a failing task aborts the wait with its own fault and nothing
    // after the failing batch is consumed
    #[test]
    fn test_first_error_aborts(
        histories in prop::collection::vec(history_strategy(), 1..6),
        failing_seed in 0usize..16,
        picks in prop::collection::vec(0usize..16, 1..24),
        batch_sizes in prop::collection::vec(1usize..=3, 1..8),
    ) {
        let failing = failing_seed % histories.len();
        let terminal = |task: usize| if task == failing { TaskState::Error } else { TaskState::Success };
        let (batches, merged) = interleave(&histories, terminal, &picks, &batch_sizes);

        let error_position = merged
            .iter()
            .position(|event| event.state == TaskState::Error)
            .expect("error event present");
        let mut consumed_events = 0;
        let mut error_batch = 0;
        for (index, batch) in batches.iter().enumerate() {
            consumed_events += batch.objects.len();
            if consumed_events > error_position {
                error_batch = index;
                break;
            }
        }

        let tasks: Vec<TaskId> = (0..histories.len()).map(task_id).collect();
        let total = batches.len();
        let inventory = ScriptedInventory::new(batches)
            .with_task_fault(task_id(failing).as_str(), fault_for(failing));

        let result = run(TaskWaiter::new(&inventory).wait_for_tasks(&tasks));

        match result {
            Err(SweepError::TaskFailed { task, fault }) => {
                prop_assert_eq!(task, task_id(failing));
                prop_assert_eq!(fault, fault_for(failing));
            }
            other => prop_assert!(false, "expected TaskFailed, got {:?}", other),
        }
        prop_assert_eq!(inventory.remaining_updates(), total - error_batch - 1);
        prop_assert_eq!(inventory.filters_destroyed(), 1);
    }
}
