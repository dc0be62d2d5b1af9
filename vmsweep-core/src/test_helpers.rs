//! In-memory inventory fakes for tests
//!
//! - [`ScriptedInventory`] replays a fixed list of update sets, for exercising
//!   the task waiter against exact notification sequences.
//! - [`FakeInventory`] holds a small folder/VM tree, records every call and
//!   drives each watched task to a terminal state over two update sets.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::{SweepError, SweepResult};
use crate::inventory::{InventoryClient, SearchScope, TargetResolver};
use crate::types::{
    FilterId, FilterSpec, Folder, FolderRef, ObjectUpdate, PowerState, PropertyChange, TaskFault,
    TaskId, TaskInfo, TaskState, UpdateSet, UpdateVersion, VirtualMachine, VmRef,
};

fn task_info(task: &str, state: TaskState, error: Option<TaskFault>) -> TaskInfo {
    let mut info = TaskInfo::queued(TaskId::new(task), "ScriptedTask", None);
    info.state = state;
    info.error = error;
    if state.is_terminal() {
        info.complete_time = Some(Utc::now());
    }
    info
}

/// Update set reporting the full `info` record of each listed task
pub fn info_update(version: &str, entries: &[(&str, TaskState)]) -> UpdateSet {
    UpdateSet {
        version: UpdateVersion::new(version),
        objects: entries
            .iter()
            .map(|(task, state)| ObjectUpdate {
                task: TaskId::new(*task),
                changes: vec![PropertyChange::info(task_info(task, *state, None))],
            })
            .collect(),
    }
}

/// Update set reporting a bare `info.state` change for each listed task
pub fn state_update(version: &str, entries: &[(&str, TaskState)]) -> UpdateSet {
    UpdateSet {
        version: UpdateVersion::new(version),
        objects: entries
            .iter()
            .map(|(task, state)| ObjectUpdate {
                task: TaskId::new(*task),
                changes: vec![PropertyChange::state(*state)],
            })
            .collect(),
    }
}

#[derive(Debug, Default)]
struct ScriptLog {
    filters_created: usize,
    filters_destroyed: usize,
    versions_requested: Vec<Option<String>>,
    filter_specs: Vec<FilterSpec>,
}

/// Replays a fixed sequence of update sets
#[derive(Debug)]
pub struct ScriptedInventory {
    updates: Mutex<VecDeque<UpdateSet>>,
    task_faults: HashMap<TaskId, TaskFault>,
    fail_create_filter: bool,
    fail_destroy_filter: bool,
    fail_task_info: bool,
    log: Mutex<ScriptLog>,
}

impl ScriptedInventory {
    pub fn new(updates: Vec<UpdateSet>) -> Self {
        Self {
            updates: Mutex::new(updates.into()),
            task_faults: HashMap::new(),
            fail_create_filter: false,
            fail_destroy_filter: false,
            fail_task_info: false,
            log: Mutex::new(ScriptLog::default()),
        }
    }

    /// Fault returned by `task_info` for this task
    pub fn with_task_fault(mut self, task: &str, fault: TaskFault) -> Self {
        self.task_faults.insert(TaskId::new(task), fault);
        self
    }

    pub fn failing_create_filter(mut self) -> Self {
        self.fail_create_filter = true;
        self
    }

    pub fn failing_destroy_filter(mut self) -> Self {
        self.fail_destroy_filter = true;
        self
    }

    /// Make every `task_info` lookup fail
    pub fn failing_task_info(mut self) -> Self {
        self.fail_task_info = true;
        self
    }

    /// A task-info record in the error state carrying `fault`
    pub fn failed_info(task: &str, fault: TaskFault) -> TaskInfo {
        task_info(task, TaskState::Error, Some(fault))
    }

    pub fn remaining_updates(&self) -> usize {
        self.updates.lock().len()
    }

    pub fn filters_created(&self) -> usize {
        self.log.lock().filters_created
    }

    pub fn filters_destroyed(&self) -> usize {
        self.log.lock().filters_destroyed
    }

    pub fn versions_requested(&self) -> Vec<Option<String>> {
        self.log.lock().versions_requested.clone()
    }

    pub fn filter_specs(&self) -> Vec<FilterSpec> {
        self.log.lock().filter_specs.clone()
    }
}

#[async_trait]
impl InventoryClient for ScriptedInventory {
    async fn power_off(&self, _vm: &VmRef) -> SweepResult<TaskId> {
        Err(SweepError::internal("scripted inventory does not submit tasks"))
    }

    async fn destroy(&self, _vm: &VmRef) -> SweepResult<TaskId> {
        Err(SweepError::internal("scripted inventory does not submit tasks"))
    }

    async fn task_info(&self, task: &TaskId) -> SweepResult<TaskInfo> {
        if self.fail_task_info {
            return Err(SweepError::inventory_fault(
                "RetrieveProperties",
                format!("ManagedObjectNotFound: {}", task),
            ));
        }
        Ok(match self.task_faults.get(task) {
            Some(fault) => task_info(task.as_str(), TaskState::Error, Some(fault.clone())),
            None => task_info(task.as_str(), TaskState::Running, None),
        })
    }

    async fn create_filter(&self, spec: FilterSpec) -> SweepResult<FilterId> {
        if self.fail_create_filter {
            return Err(SweepError::inventory_fault("CreateFilter", "filter quota exceeded"));
        }
        let mut log = self.log.lock();
        log.filters_created += 1;
        log.filter_specs.push(spec);
        Ok(FilterId::new(format!("filter-{}", log.filters_created)))
    }

    async fn destroy_filter(&self, _filter: &FilterId) -> SweepResult<()> {
        self.log.lock().filters_destroyed += 1;
        if self.fail_destroy_filter {
            return Err(SweepError::inventory_fault(
                "DestroyPropertyFilter",
                "session is no longer valid",
            ));
        }
        Ok(())
    }

    async fn wait_for_updates(&self, version: Option<&UpdateVersion>) -> SweepResult<UpdateSet> {
        self.log
            .lock()
            .versions_requested
            .push(version.map(|v| v.as_str().to_string()));
        self.updates
            .lock()
            .pop_front()
            .ok_or_else(|| SweepError::internal("update script exhausted"))
    }
}

/// Kind of task submitted against a VM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    PowerOff,
    Destroy,
}

/// One call observed by [`FakeInventory`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    PowerOff(String),
    Destroy(String),
    CreateFilter(usize),
    DestroyFilter,
}

#[derive(Debug, Default)]
struct FakeState {
    calls: Vec<RecordedCall>,
    tasks: HashMap<TaskId, (TaskKind, String)>,
    watched: Vec<TaskId>,
    reported_running: bool,
    next_task: u64,
}

/// Folder/VM tree with scripted task outcomes
#[derive(Debug, Default)]
pub struct FakeInventory {
    folders: Vec<Folder>,
    vms: Vec<(Option<FolderRef>, VirtualMachine)>,
    failures: HashMap<(TaskKind, String), TaskFault>,
    state: Mutex<FakeState>,
}

impl FakeInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_folder(mut self, name: &str) -> Self {
        let moref = FolderRef::new(format!("group-v{}", self.folders.len() + 1));
        self.folders.push(Folder {
            moref,
            name: name.to_string(),
        });
        self
    }

    /// Add a VM at the inventory root
    pub fn with_vm(self, name: &str, power_state: PowerState) -> Self {
        self.add_vm(None, name, power_state)
    }

    /// Add a VM inside a previously added folder
    pub fn with_vm_in(self, folder: &str, name: &str, power_state: PowerState) -> Self {
        let parent = self
            .folders
            .iter()
            .find(|f| f.name == folder)
            .map(|f| f.moref.clone());
        assert!(parent.is_some(), "unknown folder {}", folder);
        self.add_vm(parent, name, power_state)
    }

    fn add_vm(mut self, parent: Option<FolderRef>, name: &str, power_state: PowerState) -> Self {
        let moref = VmRef::new(format!("vm-{}", self.vms.len() + 1));
        self.vms.push((
            parent,
            VirtualMachine {
                moref,
                name: name.to_string(),
                power_state,
            },
        ));
        self
    }

    /// Make the `kind` task for VM `name` end in error
    pub fn failing(mut self, kind: TaskKind, name: &str, fault: TaskFault) -> Self {
        self.failures.insert((kind, name.to_string()), fault);
        self
    }

    pub fn vm(&self, name: &str) -> VirtualMachine {
        self.vms
            .iter()
            .map(|(_, vm)| vm)
            .find(|vm| vm.name == name)
            .cloned()
            .unwrap_or_else(|| panic!("unknown vm {}", name))
    }

    pub fn folder(&self, name: &str) -> Folder {
        self.folders
            .iter()
            .find(|f| f.name == name)
            .cloned()
            .unwrap_or_else(|| panic!("unknown folder {}", name))
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }

    fn vm_name(&self, vm: &VmRef) -> SweepResult<String> {
        self.vms
            .iter()
            .find(|(_, candidate)| &candidate.moref == vm)
            .map(|(_, candidate)| candidate.name.clone())
            .ok_or_else(|| SweepError::inventory_fault("lookup", format!("no vm {}", vm)))
    }

    fn submit(&self, kind: TaskKind, vm: &VmRef) -> SweepResult<TaskId> {
        let name = self.vm_name(vm)?;
        let mut state = self.state.lock();
        state.next_task += 1;
        let task = TaskId::new(format!("task-{}", state.next_task));
        state.calls.push(match kind {
            TaskKind::PowerOff => RecordedCall::PowerOff(name.clone()),
            TaskKind::Destroy => RecordedCall::Destroy(name.clone()),
        });
        state.tasks.insert(task.clone(), (kind, name));
        Ok(task)
    }

    fn fault_for(&self, state: &FakeState, task: &TaskId) -> Option<TaskFault> {
        state
            .tasks
            .get(task)
            .and_then(|key| self.failures.get(key))
            .cloned()
    }
}

#[async_trait]
impl InventoryClient for FakeInventory {
    async fn power_off(&self, vm: &VmRef) -> SweepResult<TaskId> {
        self.submit(TaskKind::PowerOff, vm)
    }

    async fn destroy(&self, vm: &VmRef) -> SweepResult<TaskId> {
        self.submit(TaskKind::Destroy, vm)
    }

    async fn task_info(&self, task: &TaskId) -> SweepResult<TaskInfo> {
        let state = self.state.lock();
        let fault = self.fault_for(&state, task);
        let terminal = if fault.is_some() {
            TaskState::Error
        } else {
            TaskState::Success
        };
        Ok(task_info(task.as_str(), terminal, fault))
    }

    async fn create_filter(&self, spec: FilterSpec) -> SweepResult<FilterId> {
        let mut state = self.state.lock();
        state.calls.push(RecordedCall::CreateFilter(spec.objects.len()));
        state.watched = spec.objects.into_iter().collect();
        state.reported_running = false;
        Ok(FilterId::new("filter-1"))
    }

    async fn destroy_filter(&self, _filter: &FilterId) -> SweepResult<()> {
        let mut state = self.state.lock();
        state.calls.push(RecordedCall::DestroyFilter);
        state.watched.clear();
        Ok(())
    }

    async fn wait_for_updates(&self, version: Option<&UpdateVersion>) -> SweepResult<UpdateSet> {
        let mut state = self.state.lock();
        if state.watched.is_empty() {
            return Err(SweepError::internal("wait_for_updates without a live filter"));
        }

        if version.is_none() {
            state.reported_running = true;
            let objects = state
                .watched
                .iter()
                .map(|task| ObjectUpdate {
                    task: task.clone(),
                    changes: vec![PropertyChange::info(task_info(
                        task.as_str(),
                        TaskState::Running,
                        None,
                    ))],
                })
                .collect();
            return Ok(UpdateSet {
                version: UpdateVersion::new("1"),
                objects,
            });
        }

        if !state.reported_running {
            return Err(SweepError::internal("incremental wait before initial update"));
        }

        let objects = state
            .watched
            .iter()
            .map(|task| {
                let terminal = if self.fault_for(&state, task).is_some() {
                    TaskState::Error
                } else {
                    TaskState::Success
                };
                ObjectUpdate {
                    task: task.clone(),
                    changes: vec![PropertyChange::state(terminal)],
                }
            })
            .collect();
        // Every watched task is terminal after this set
        state.watched.clear();
        Ok(UpdateSet {
            version: UpdateVersion::new("2"),
            objects,
        })
    }
}

#[async_trait]
impl TargetResolver for FakeInventory {
    async fn find_folder(&self, name: &str) -> SweepResult<Option<Folder>> {
        Ok(self.folders.iter().find(|f| f.name == name).cloned())
    }

    async fn find_vms(
        &self,
        names: &HashSet<String>,
        scope: SearchScope,
    ) -> SweepResult<Vec<VirtualMachine>> {
        Ok(self
            .vms
            .iter()
            .filter(|(parent, _)| match &scope {
                SearchScope::Root => true,
                SearchScope::Folder(folder) => parent.as_ref() == Some(folder),
            })
            .map(|(_, vm)| vm)
            .filter(|vm| names.contains(&vm.name))
            .cloned()
            .collect())
    }
}
