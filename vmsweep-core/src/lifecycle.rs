//! Power-off then destroy sequencing across a set of target VMs
//!
//! The orchestrator runs two phases, each a batch of inventory tasks followed
//! by a [`TaskWaiter`] barrier:
//!
//! 1. **Power-off**: every target currently `poweredOn` gets a power-off task.
//!    A failing task aborts the run before anything is destroyed.
//! 2. **Destroy**: every target gets a destroy task, including the ones that
//!    were already powered off.

use std::fmt;
use tracing::info;

use crate::error::SweepResult;
use crate::inventory::InventoryClient;
use crate::task_waiter::TaskWaiter;
use crate::types::{Folder, PowerState, VirtualMachine};

/// Resolved targets, with the folder they were looked up in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSet {
    pub folder: Option<Folder>,
    pub vms: Vec<VirtualMachine>,
}

impl TargetSet {
    pub fn new(folder: Option<Folder>, vms: Vec<VirtualMachine>) -> Self {
        Self { folder, vms }
    }

    pub fn is_empty(&self) -> bool {
        self.vms.is_empty()
    }

    /// VM name, qualified as `folder/vm` when a folder scope was given
    pub fn display_name(&self, vm: &VirtualMachine) -> String {
        match &self.folder {
            Some(folder) => format!("{}/{}", folder.name, vm.name),
            None => vm.name.clone(),
        }
    }
}

/// Progress notification emitted before each task is requested
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    PoweringOff { vm: String },
    Destroying { vm: String },
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEvent::PoweringOff { vm } => write!(f, "Powering off {}", vm),
            LifecycleEvent::Destroying { vm } => write!(f, "Destroying {}", vm),
        }
    }
}

/// Receives lifecycle progress. Purely observational.
pub trait ProgressObserver: Send + Sync {
    fn on_event(&self, event: &LifecycleEvent);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl ProgressObserver for SilentProgress {
    fn on_event(&self, _event: &LifecycleEvent) {}
}

/// What a completed run did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleReport {
    pub powered_off: usize,
    pub destroyed: usize,
}

/// Sequences power-off and destroy phases over an inventory client
pub struct LifecycleOrchestrator<'a, C: ?Sized> {
    client: &'a C,
    progress: &'a dyn ProgressObserver,
}

impl<'a, C> LifecycleOrchestrator<'a, C>
where
    C: InventoryClient + ?Sized,
{
    pub fn new(client: &'a C, progress: &'a dyn ProgressObserver) -> Self {
        Self { client, progress }
    }

    /// Power off the running targets, then destroy all of them.
    ///
    /// Returns the first task failure of either phase. An empty target set
    /// submits nothing.
    pub async fn power_down_and_destroy(&self, targets: &TargetSet) -> SweepResult<LifecycleReport> {
        let waiter = TaskWaiter::new(self.client);
        let mut report = LifecycleReport::default();

        let mut power_tasks = Vec::new();
        for vm in targets
            .vms
            .iter()
            .filter(|vm| vm.power_state == PowerState::PoweredOn)
        {
            self.progress.on_event(&LifecycleEvent::PoweringOff {
                vm: targets.display_name(vm),
            });
            power_tasks.push(self.client.power_off(&vm.moref).await?);
        }

        if !power_tasks.is_empty() {
            info!(count = power_tasks.len(), "Waiting for power-off tasks");
            waiter.wait_for_tasks(&power_tasks).await?;
            report.powered_off = power_tasks.len();
        }

        let mut destroy_tasks = Vec::with_capacity(targets.vms.len());
        for vm in &targets.vms {
            self.progress.on_event(&LifecycleEvent::Destroying {
                vm: targets.display_name(vm),
            });
            destroy_tasks.push(self.client.destroy(&vm.moref).await?);
        }

        if !destroy_tasks.is_empty() {
            info!(count = destroy_tasks.len(), "Waiting for destroy tasks");
            waiter.wait_for_tasks(&destroy_tasks).await?;
            report.destroyed = destroy_tasks.len();
        }

        Ok(report)
    }
}
