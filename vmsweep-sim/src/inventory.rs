//! Shared state of a simulated inventory
//!
//! One [`SimulatedInventory`] is shared by every session opened against it.
//! Tasks advance on spawned tokio tasks (`queued → running → terminal`), and
//! every property change is appended to a versioned change log. Waiters watch
//! a `tokio::sync::watch` channel carrying the latest version, so a change
//! landing between "check the log" and "wait" is never missed.

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

use vmsweep_core::error::{SweepError, SweepResult};
use vmsweep_core::inventory::SearchScope;
use vmsweep_core::types::{
    FilterId, Folder, FolderRef, ObjectUpdate, PowerState, PropertyChange, TaskFault, TaskId,
    TaskInfo, TaskState, UpdateSet, UpdateVersion, VirtualMachine, VmRef,
};

use crate::model::{Credentials, FolderSpec, InventoryFile, VmSpec};

/// Task operations the simulator knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    PowerOff,
    Destroy,
}

impl Operation {
    pub fn task_name(self) -> &'static str {
        match self {
            Operation::PowerOff => "PowerOffVM_Task",
            Operation::Destroy => "Destroy_Task",
        }
    }
}

/// Property filter registered by a session
#[derive(Debug, Clone)]
pub(crate) struct FilterState {
    pub tasks: BTreeSet<TaskId>,
    /// Whether the full initial `info` set has been delivered
    pub initialized: bool,
}

#[derive(Debug)]
struct FolderRecord {
    moref: FolderRef,
    name: String,
}

#[derive(Debug)]
struct VmRecord {
    moref: VmRef,
    name: String,
    parent: Option<FolderRef>,
    power_state: PowerState,
    fail_power_off: Option<String>,
    fail_destroy: Option<String>,
    destroyed: bool,
}

#[derive(Debug)]
struct ChangeRecord {
    version: u64,
    task: TaskId,
    change: PropertyChange,
}

#[derive(Debug, Default)]
struct InventoryState {
    folders: Vec<FolderRecord>,
    vms: Vec<VmRecord>,
    tasks: HashMap<TaskId, TaskInfo>,
    changes: Vec<ChangeRecord>,
    version: u64,
    next_task: u64,
    /// Last version delivered to each session
    cursors: HashMap<String, u64>,
    /// Records at or below this version have been dropped
    horizon: u64,
}

impl InventoryState {
    fn live_vm(&self, moref: &VmRef) -> Option<&VmRecord> {
        self.vms.iter().find(|vm| &vm.moref == moref && !vm.destroyed)
    }

    fn live_vm_mut(&mut self, moref: &VmRef) -> Option<&mut VmRecord> {
        self.vms
            .iter_mut()
            .find(|vm| &vm.moref == moref && !vm.destroyed)
    }

    fn record(&mut self, task: &TaskId, change: PropertyChange) {
        self.version += 1;
        self.changes.push(ChangeRecord {
            version: self.version,
            task: task.clone(),
            change,
        });
    }

    /// Drop change records every live session has already been sent
    fn prune(&mut self) {
        let Some(floor) = self.cursors.values().min().copied() else {
            return;
        };
        if floor > self.horizon {
            self.changes.retain(|record| record.version > floor);
            self.horizon = floor;
        }
    }

    fn add_vm(&mut self, spec: &VmSpec, parent: Option<FolderRef>) {
        let moref = VmRef::new(format!("vm-{}", self.vms.len() + 1));
        self.vms.push(VmRecord {
            moref,
            name: spec.name.clone(),
            parent,
            power_state: spec.power_state,
            fail_power_off: spec.fail_power_off.clone(),
            fail_destroy: spec.fail_destroy.clone(),
            destroyed: false,
        });
    }

    fn add_folder(&mut self, spec: &FolderSpec) {
        let moref = FolderRef::new(format!("group-v{}", self.folders.len() + 1));
        self.folders.push(FolderRecord {
            moref: moref.clone(),
            name: spec.name.clone(),
        });
        for vm in &spec.vms {
            self.add_vm(vm, Some(moref.clone()));
        }
        for child in &spec.folders {
            self.add_folder(child);
        }
    }
}

struct Inner {
    state: Mutex<InventoryState>,
    versions: watch::Sender<u64>,
    credentials: Option<Credentials>,
    task_duration: Duration,
}

/// In-memory inventory with asynchronous tasks
#[derive(Clone)]
pub struct SimulatedInventory {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SimulatedInventory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("SimulatedInventory")
            .field("folders", &state.folders.len())
            .field("vms", &state.vms.len())
            .field("tasks", &state.tasks.len())
            .field("version", &state.version)
            .finish()
    }
}

impl SimulatedInventory {
    pub fn new(file: InventoryFile) -> Self {
        let mut state = InventoryState::default();
        for vm in &file.vms {
            state.add_vm(vm, None);
        }
        for folder in &file.folders {
            state.add_folder(folder);
        }

        let (versions, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                versions,
                credentials: file.credentials,
                task_duration: file.task_duration,
            }),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> SweepResult<Self> {
        let file = InventoryFile::load(path.as_ref())?;
        info!(path = %path.as_ref().display(), "Loaded simulated inventory");
        Ok(Self::new(file))
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.inner.credentials.as_ref()
    }

    /// Power state of the first live VM with this name
    pub fn vm_power_state(&self, name: &str) -> Option<PowerState> {
        self.inner
            .state
            .lock()
            .vms
            .iter()
            .find(|vm| vm.name == name && !vm.destroyed)
            .map(|vm| vm.power_state)
    }

    pub fn vm_exists(&self, name: &str) -> bool {
        self.vm_power_state(name).is_some()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.versions.subscribe()
    }

    /// Wake every blocked waiter without recording a change
    pub(crate) fn wake_waiters(&self) {
        self.inner.versions.send_modify(|_| {});
    }

    pub(crate) fn submit(&self, operation: Operation, vm: &VmRef) -> SweepResult<TaskId> {
        let task = {
            let mut state = self.inner.state.lock();
            let name = state
                .live_vm(vm)
                .map(|record| record.name.clone())
                .ok_or_else(|| {
                    SweepError::inventory_fault(
                        operation.task_name(),
                        format!(
                            "ManagedObjectNotFound: The object '{}' has already been deleted or has not been completely created",
                            vm
                        ),
                    )
                })?;

            state.next_task += 1;
            let task = TaskId::new(format!("task-{}", state.next_task));
            state.tasks.insert(
                task.clone(),
                TaskInfo::queued(task.clone(), operation.task_name(), Some(name.clone())),
            );
            debug!(task = %task, vm = %name, operation = operation.task_name(), "Queued task");
            task
        };

        tokio::spawn(run_task(self.clone(), task.clone(), operation, vm.clone()));
        Ok(task)
    }

    pub(crate) fn task_info(&self, task: &TaskId) -> SweepResult<TaskInfo> {
        self.inner
            .state
            .lock()
            .tasks
            .get(task)
            .cloned()
            .ok_or_else(|| {
                SweepError::inventory_fault("RetrieveProperties", format!("ManagedObjectNotFound: {}", task))
            })
    }

    pub(crate) fn unknown_tasks<'a>(&self, tasks: impl IntoIterator<Item = &'a TaskId>) -> Vec<TaskId> {
        let state = self.inner.state.lock();
        tasks
            .into_iter()
            .filter(|task| !state.tasks.contains_key(*task))
            .cloned()
            .collect()
    }

    /// Changes newer than `since` on the given filters. Filters that have not
    /// delivered their initial set (or every filter when `since` is `None` or
    /// older than the pruned log) report the full `info` record of each
    /// watched task instead.
    pub(crate) fn collect_updates(
        &self,
        session: &str,
        filters: &mut BTreeMap<FilterId, FilterState>,
        since: Option<u64>,
    ) -> Option<UpdateSet> {
        let mut state = self.inner.state.lock();
        let since = since.filter(|version| *version >= state.horizon);
        let mut objects: Vec<ObjectUpdate> = Vec::new();

        for filter in filters.values_mut() {
            let Some(since) = since.filter(|_| filter.initialized) else {
                for task in &filter.tasks {
                    if let Some(info) = state.tasks.get(task) {
                        push_change(&mut objects, task, PropertyChange::info(info.clone()));
                    }
                }
                filter.initialized = true;
                continue;
            };

            for record in state
                .changes
                .iter()
                .filter(|record| record.version > since && filter.tasks.contains(&record.task))
            {
                push_change(&mut objects, &record.task, record.change.clone());
            }
        }

        if objects.is_empty() {
            return None;
        }

        let version = state.version;
        state.cursors.insert(session.to_string(), version);
        state.prune();

        Some(UpdateSet {
            version: UpdateVersion::new(version.to_string()),
            objects,
        })
    }

    /// Forget a closed session so it no longer holds back pruning
    pub(crate) fn release_session(&self, session: &str) {
        let mut state = self.inner.state.lock();
        state.cursors.remove(session);
        state.prune();
    }

    #[cfg(test)]
    fn retained_changes(&self) -> usize {
        self.inner.state.lock().changes.len()
    }

    pub(crate) fn find_folder(&self, name: &str) -> Option<Folder> {
        self.inner
            .state
            .lock()
            .folders
            .iter()
            .find(|folder| folder.name == name)
            .map(|folder| Folder {
                moref: folder.moref.clone(),
                name: folder.name.clone(),
            })
    }

    pub(crate) fn find_vms(&self, names: &HashSet<String>, scope: &SearchScope) -> Vec<VirtualMachine> {
        self.inner
            .state
            .lock()
            .vms
            .iter()
            .filter(|vm| !vm.destroyed && names.contains(&vm.name))
            .filter(|vm| match scope {
                SearchScope::Root => true,
                SearchScope::Folder(folder) => vm.parent.as_ref() == Some(folder),
            })
            .map(|vm| VirtualMachine {
                moref: vm.moref.clone(),
                name: vm.name.clone(),
                power_state: vm.power_state,
            })
            .collect()
    }

    fn mark_running(&self, task: &TaskId) {
        let mut state = self.inner.state.lock();
        if let Some(info) = state.tasks.get_mut(task) {
            info.state = TaskState::Running;
        }
        state.record(task, PropertyChange::state(TaskState::Running));
        state.record(task, PropertyChange::other("info.progress", serde_json::json!(0)));
        self.inner.versions.send_replace(state.version);
    }

    fn complete(&self, task: &TaskId, operation: Operation, vm: &VmRef) {
        let mut state = self.inner.state.lock();
        let outcome = apply_operation(&mut state, operation, vm);

        if let Some(info) = state.tasks.get_mut(task) {
            info.complete_time = Some(Utc::now());
            match &outcome {
                Ok(()) => info.state = TaskState::Success,
                Err(fault) => {
                    info.state = TaskState::Error;
                    info.error = Some(fault.clone());
                }
            }
        }

        match outcome {
            Ok(()) => {
                debug!(task = %task, "Task succeeded");
                state.record(task, PropertyChange::other("info.progress", serde_json::json!(100)));
                state.record(task, PropertyChange::state(TaskState::Success));
            }
            Err(fault) => {
                debug!(task = %task, fault = %fault, "Task failed");
                let payload = serde_json::to_value(&fault).unwrap_or(serde_json::Value::Null);
                state.record(task, PropertyChange::other("info.error", payload));
                state.record(task, PropertyChange::state(TaskState::Error));
            }
        }
        self.inner.versions.send_replace(state.version);
    }
}

fn push_change(objects: &mut Vec<ObjectUpdate>, task: &TaskId, change: PropertyChange) {
    match objects.iter_mut().find(|object| &object.task == task) {
        Some(object) => object.changes.push(change),
        None => objects.push(ObjectUpdate {
            task: task.clone(),
            changes: vec![change],
        }),
    }
}

fn invalid_power_state(state: PowerState) -> TaskFault {
    let current = match state {
        PowerState::PoweredOn => "Powered on",
        PowerState::PoweredOff => "Powered off",
        PowerState::Suspended => "Suspended",
    };
    TaskFault::new(
        "InvalidPowerState",
        format!(
            "The attempted operation cannot be performed in the current state ({}).",
            current
        ),
    )
}

fn apply_operation(state: &mut InventoryState, operation: Operation, vm: &VmRef) -> Result<(), TaskFault> {
    let record = state.live_vm_mut(vm).ok_or_else(|| {
        TaskFault::new(
            "ManagedObjectNotFound",
            format!("The object '{}' has already been deleted or has not been completely created", vm),
        )
    })?;

    match operation {
        Operation::PowerOff => {
            if record.power_state != PowerState::PoweredOn {
                return Err(invalid_power_state(record.power_state));
            }
            if let Some(message) = &record.fail_power_off {
                return Err(TaskFault::new("SystemError", message.clone()));
            }
            record.power_state = PowerState::PoweredOff;
        }
        Operation::Destroy => {
            if record.power_state == PowerState::PoweredOn {
                return Err(invalid_power_state(record.power_state));
            }
            if let Some(message) = &record.fail_destroy {
                return Err(TaskFault::new("SystemError", message.clone()));
            }
            record.destroyed = true;
        }
    }
    Ok(())
}

async fn run_task(inventory: SimulatedInventory, task: TaskId, operation: Operation, vm: VmRef) {
    let total = inventory.inner.task_duration;
    let queued = total / 2;

    tokio::time::sleep(queued).await;
    inventory.mark_running(&task);

    tokio::time::sleep(total.saturating_sub(queued)).await;
    inventory.complete(&task, operation, &vm);
}
