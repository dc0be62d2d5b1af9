use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use vmsweep_core::config::ConnectionConfig;
use vmsweep_core::error::{SweepError, SweepResult};
use vmsweep_core::inventory::{
    InventoryClient, InventoryConnector, InventorySession, SearchScope, TargetResolver,
};
use vmsweep_core::types::{
    FilterId, FilterSpec, Folder, TaskId, TaskInfo, UpdateSet, UpdateVersion, VirtualMachine,
    VmRef,
};

use crate::inventory::{FilterState, Operation, SimulatedInventory};

/// One login against a [`SimulatedInventory`]
///
/// Property filters belong to the session that created them and vanish when
/// it disconnects.
pub struct SimulatedSession {
    inventory: SimulatedInventory,
    key: String,
    connected: AtomicBool,
    filters: Mutex<BTreeMap<FilterId, FilterState>>,
    next_filter: AtomicU64,
}

impl SimulatedSession {
    pub fn new(inventory: SimulatedInventory) -> Self {
        Self {
            inventory,
            key: uuid::Uuid::new_v4().to_string(),
            connected: AtomicBool::new(true),
            filters: Mutex::new(BTreeMap::new()),
            next_filter: AtomicU64::new(0),
        }
    }

    /// Number of property filters currently registered
    pub fn active_filters(&self) -> usize {
        self.filters.lock().len()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn ensure_connected(&self) -> SweepResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(SweepError::NotConnected)
        }
    }

    fn submit(&self, operation: Operation, vm: &VmRef) -> SweepResult<TaskId> {
        self.ensure_connected()?;
        self.inventory.submit(operation, vm)
    }

    fn poll(&self, since: Option<u64>) -> SweepResult<Option<UpdateSet>> {
        let mut filters = self.filters.lock();
        if filters.is_empty() {
            return Err(SweepError::inventory_fault(
                "WaitForUpdatesEx",
                "InvalidState: no property filters are registered on this session",
            ));
        }
        Ok(self.inventory.collect_updates(&self.key, &mut filters, since))
    }
}

fn parse_version(version: Option<&UpdateVersion>) -> SweepResult<Option<u64>> {
    version
        .map(|v| {
            v.as_str().parse::<u64>().map_err(|_| {
                SweepError::inventory_fault(
                    "WaitForUpdatesEx",
                    format!("InvalidArgument: malformed version '{}'", v),
                )
            })
        })
        .transpose()
}

#[async_trait]
impl InventoryClient for SimulatedSession {
    async fn power_off(&self, vm: &VmRef) -> SweepResult<TaskId> {
        self.submit(Operation::PowerOff, vm)
    }

    async fn destroy(&self, vm: &VmRef) -> SweepResult<TaskId> {
        self.submit(Operation::Destroy, vm)
    }

    async fn task_info(&self, task: &TaskId) -> SweepResult<TaskInfo> {
        self.ensure_connected()?;
        self.inventory.task_info(task)
    }

    async fn create_filter(&self, spec: FilterSpec) -> SweepResult<FilterId> {
        self.ensure_connected()?;

        let unknown = self.inventory.unknown_tasks(&spec.objects);
        if !unknown.is_empty() {
            return Err(SweepError::inventory_fault(
                "CreateFilter",
                format!("ManagedObjectNotFound: {:?}", unknown),
            ));
        }

        let id = self.next_filter.fetch_add(1, Ordering::SeqCst) + 1;
        let filter = FilterId::new(format!("filter-{}", id));
        debug!(filter = %filter, tasks = spec.objects.len(), "Created property filter");
        self.filters.lock().insert(
            filter.clone(),
            FilterState {
                tasks: spec.objects,
                initialized: false,
            },
        );
        Ok(filter)
    }

    async fn destroy_filter(&self, filter: &FilterId) -> SweepResult<()> {
        self.ensure_connected()?;
        match self.filters.lock().remove(filter) {
            Some(_) => {
                debug!(filter = %filter, "Destroyed property filter");
                Ok(())
            }
            None => Err(SweepError::inventory_fault(
                "DestroyPropertyFilter",
                format!("ManagedObjectNotFound: {}", filter),
            )),
        }
    }

    async fn wait_for_updates(&self, version: Option<&UpdateVersion>) -> SweepResult<UpdateSet> {
        let since = parse_version(version)?;
        let mut versions = self.inventory.subscribe();

        loop {
            self.ensure_connected()?;
            versions.borrow_and_update();
            if let Some(update) = self.poll(since)? {
                return Ok(update);
            }
            versions
                .changed()
                .await
                .map_err(|_| SweepError::internal("simulated inventory shut down"))?;
        }
    }
}

#[async_trait]
impl TargetResolver for SimulatedSession {
    async fn find_folder(&self, name: &str) -> SweepResult<Option<Folder>> {
        self.ensure_connected()?;
        Ok(self.inventory.find_folder(name))
    }

    async fn find_vms(
        &self,
        names: &HashSet<String>,
        scope: SearchScope,
    ) -> SweepResult<Vec<VirtualMachine>> {
        self.ensure_connected()?;
        Ok(self.inventory.find_vms(names, &scope))
    }
}

#[async_trait]
impl InventorySession for SimulatedSession {
    fn session_key(&self) -> &str {
        &self.key
    }

    async fn disconnect(&self) -> SweepResult<()> {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.filters.lock().clear();
            self.inventory.release_session(&self.key);
            self.inventory.wake_waiters();
            debug!(session = %self.key, "Session closed");
        }
        Ok(())
    }
}

/// Opens sessions against a shared [`SimulatedInventory`]
#[derive(Debug, Clone)]
pub struct SimulatedConnector {
    inventory: SimulatedInventory,
}

impl SimulatedConnector {
    pub fn new(inventory: SimulatedInventory) -> Self {
        Self { inventory }
    }

    pub fn inventory(&self) -> &SimulatedInventory {
        &self.inventory
    }

    /// Authenticate and return the concrete session type
    pub fn login(&self, config: &ConnectionConfig) -> SweepResult<SimulatedSession> {
        if let Some(expected) = self.inventory.credentials() {
            if expected.user != config.user || expected.password != config.password {
                return Err(SweepError::connection(
                    config.endpoint(),
                    "InvalidLogin: Cannot complete login due to an incorrect user name or password.",
                ));
            }
        }

        let session = SimulatedSession::new(self.inventory.clone());
        info!(
            endpoint = %config.endpoint(),
            user = %config.user,
            session = %session.session_key(),
            "Opened simulated inventory session"
        );
        Ok(session)
    }
}

#[async_trait]
impl InventoryConnector for SimulatedConnector {
    async fn connect(&self, config: &ConnectionConfig) -> SweepResult<Arc<dyn InventorySession>> {
        Ok(Arc::new(self.login(config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Credentials, InventoryFile, VmSpec};
    use std::time::Duration;
    use vmsweep_core::types::{PowerState, PropertyValue, TaskState};

    fn connector() -> SimulatedConnector {
        SimulatedConnector::new(SimulatedInventory::new(InventoryFile {
            credentials: Some(Credentials {
                user: "admin".to_string(),
                password: "secret".to_string(),
            }),
            task_duration: Duration::from_millis(10),
            vms: vec![VmSpec::new("web", PowerState::PoweredOn)],
            folders: vec![],
        }))
    }

    fn login(connector: &SimulatedConnector) -> SimulatedSession {
        let mut config = ConnectionConfig::default();
        config.address = "sim.local".to_string();
        config.user = "admin".to_string();
        config.password = "secret".to_string();
        connector.login(&config).unwrap()
    }

    async fn web(session: &SimulatedSession) -> VmRef {
        let names: HashSet<String> = ["web".to_string()].into_iter().collect();
        session.find_vms(&names, SearchScope::Root).await.unwrap()[0]
            .moref
            .clone()
    }

    #[test]
    fn test_wrong_password_is_rejected() {
        let mut config = ConnectionConfig::default();
        config.address = "sim.local".to_string();
        config.user = "admin".to_string();
        config.password = "wrong".to_string();

        let err = connector().login(&config).err().unwrap();
        assert!(matches!(err, SweepError::Connection { .. }));
        assert!(err.to_string().contains("InvalidLogin"));
    }

    #[tokio::test]
    async fn test_first_wait_returns_full_info_then_bare_states() {
        let connector = connector();
        let session = login(&connector);
        let task = session.power_off(&web(&session).await).await.unwrap();
        session
            .create_filter(FilterSpec::for_tasks([task.clone()]))
            .await
            .unwrap();

        let initial = session.wait_for_updates(None).await.unwrap();
        assert!(matches!(
            initial.objects[0].changes[0].value,
            PropertyValue::TaskInfo(_)
        ));

        let mut version = initial.version;
        let mut terminal = None;
        while terminal.is_none() {
            let update = session.wait_for_updates(Some(&version)).await.unwrap();
            for change in &update.objects[0].changes {
                if let PropertyValue::TaskState(state) = change.value {
                    if state.is_terminal() {
                        terminal = Some(state);
                    }
                }
            }
            version = update.version;
        }
        assert_eq!(terminal, Some(TaskState::Success));
    }

    #[tokio::test]
    async fn test_disconnect_drops_filters_and_fails_later_calls() {
        let connector = connector();
        let session = login(&connector);
        let task = session.power_off(&web(&session).await).await.unwrap();
        session
            .create_filter(FilterSpec::for_tasks([task]))
            .await
            .unwrap();
        assert_eq!(session.active_filters(), 1);

        session.disconnect().await.unwrap();
        session.disconnect().await.unwrap();

        assert_eq!(session.active_filters(), 0);
        assert!(matches!(
            session.wait_for_updates(None).await,
            Err(SweepError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_filter_on_unknown_task_is_rejected() {
        let session = login(&connector());
        let err = session
            .create_filter(FilterSpec::for_tasks([TaskId::new("task-404")]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ManagedObjectNotFound"));
    }

    #[tokio::test]
    async fn test_destroying_an_unknown_filter_fails() {
        let session = login(&connector());
        let err = session
            .destroy_filter(&FilterId::new("filter-9"))
            .await
            .unwrap_err();
        assert!(matches!(err, SweepError::InventoryFault { .. }));
    }
}
