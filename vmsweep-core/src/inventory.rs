//! Contracts consumed from an inventory backend
//!
//! The core never talks to a hypervisor manager directly. Everything it needs
//! is expressed by the traits in this module, which a backend implements:
//!
//! - [`InventoryClient`]: submit power-off/destroy tasks, register property
//!   filters on those tasks and block on the next batch of changes.
//! - [`TargetResolver`]: look up folders and virtual machines by name.
//! - [`InventorySession`]: one authenticated session combining both, with an
//!   explicit [`disconnect`](InventorySession::disconnect).
//! - [`InventoryConnector`]: opens sessions from a [`ConnectionConfig`].
//!
//! ## Update semantics
//!
//! [`wait_for_updates`](InventoryClient::wait_for_updates) is a long-poll.
//! Called with `None` it returns immediately with the full `info` record of
//! every watched object. Called with the version returned by the previous
//! call it blocks until something newer exists and then reports only what
//! changed, typically as a bare `info.state` property. Callers must accept
//! both shapes.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::ConnectionConfig;
use crate::error::SweepResult;
use crate::types::{
    FilterId, FilterSpec, Folder, FolderRef, TaskId, TaskInfo, UpdateSet, UpdateVersion,
    VirtualMachine, VmRef,
};

/// Task submission and change-notification primitives
#[async_trait]
pub trait InventoryClient: Send + Sync {
    /// Request a power-off of the VM. Returns as soon as the task exists.
    async fn power_off(&self, vm: &VmRef) -> SweepResult<TaskId>;

    /// Request destruction of the VM. Returns as soon as the task exists.
    async fn destroy(&self, vm: &VmRef) -> SweepResult<TaskId>;

    /// Fetch the current task-info record of a task
    async fn task_info(&self, task: &TaskId) -> SweepResult<TaskInfo>;

    /// Register a property filter. The caller owns the returned filter and
    /// must release it with [`destroy_filter`](Self::destroy_filter).
    async fn create_filter(&self, spec: FilterSpec) -> SweepResult<FilterId>;

    async fn destroy_filter(&self, filter: &FilterId) -> SweepResult<()>;

    /// Block until changes newer than `version` exist on any live filter
    async fn wait_for_updates(&self, version: Option<&UpdateVersion>) -> SweepResult<UpdateSet>;
}

/// Where a VM lookup starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchScope {
    /// Whole inventory, recursively
    Root,
    /// Direct children of one folder only
    Folder(FolderRef),
}

/// Name lookups against the inventory
#[async_trait]
pub trait TargetResolver: Send + Sync {
    /// First folder anywhere in the inventory with exactly this name
    async fn find_folder(&self, name: &str) -> SweepResult<Option<Folder>>;

    /// Every VM within `scope` whose name is in `names`, in inventory order
    async fn find_vms(
        &self,
        names: &HashSet<String>,
        scope: SearchScope,
    ) -> SweepResult<Vec<VirtualMachine>>;
}

/// An authenticated inventory session
#[async_trait]
pub trait InventorySession: InventoryClient + TargetResolver {
    fn session_key(&self) -> &str;

    /// Close the session. Idempotent.
    async fn disconnect(&self) -> SweepResult<()>;
}

/// Opens inventory sessions
#[async_trait]
pub trait InventoryConnector: Send + Sync {
    async fn connect(&self, config: &ConnectionConfig) -> SweepResult<Arc<dyn InventorySession>>;
}
