// End-to-end lifecycle runs against the simulated inventory

use pretty_assertions::assert_eq;
use std::time::Duration;

use vmsweep_core::config::ConnectionConfig;
use vmsweep_core::error::SweepError;
use vmsweep_core::inventory::{InventoryClient, InventorySession};
use vmsweep_core::lifecycle::{LifecycleOrchestrator, LifecycleReport, SilentProgress};
use vmsweep_core::resolver::resolve_targets;
use vmsweep_core::task_waiter::TaskWaiter;
use vmsweep_core::types::PowerState;
use vmsweep_sim::{FolderSpec, InventoryFile, SimulatedConnector, SimulatedInventory, VmSpec};

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn connection() -> ConnectionConfig {
    let mut config = ConnectionConfig::default();
    config.address = "sim.local".to_string();
    config.user = "admin".to_string();
    config.password = "secret".to_string();
    config
}

fn lab_inventory(vms: Vec<VmSpec>) -> SimulatedInventory {
    SimulatedInventory::new(InventoryFile {
        task_duration: Duration::from_millis(20),
        vms: vec![VmSpec::new("outside", PowerState::PoweredOn)],
        folders: vec![FolderSpec {
            name: "lab".to_string(),
            vms,
            folders: vec![],
        }],
        ..InventoryFile::default()
    })
}

#[tokio::test]
async fn test_mixed_power_states_are_all_destroyed() {
    let inventory = lab_inventory(vec![
        VmSpec::new("web", PowerState::PoweredOn),
        VmSpec::new("db", PowerState::PoweredOff),
        VmSpec::new("cache", PowerState::Suspended),
    ]);
    let session = SimulatedConnector::new(inventory.clone())
        .login(&connection())
        .unwrap();

    let targets = resolve_targets(&session, Some("lab"), &names(&["web", "db", "cache", "outside"]))
        .await
        .unwrap();
    assert_eq!(targets.vms.len(), 3);

    let report = LifecycleOrchestrator::new(&session, &SilentProgress)
        .power_down_and_destroy(&targets)
        .await
        .unwrap();

    assert_eq!(
        report,
        LifecycleReport {
            powered_off: 1,
            destroyed: 3
        }
    );
    for name in ["web", "db", "cache"] {
        assert!(!inventory.vm_exists(name), "{} should be gone", name);
    }
    assert_eq!(inventory.vm_power_state("outside"), Some(PowerState::PoweredOn));
    assert_eq!(session.active_filters(), 0);
}

#[tokio::test]
async fn test_power_off_fault_leaves_every_vm_in_place() {
    let mut failing = VmSpec::new("web", PowerState::PoweredOn);
    failing.fail_power_off = Some("VMware Tools is not running".to_string());
    let inventory = lab_inventory(vec![failing, VmSpec::new("db", PowerState::PoweredOff)]);
    let session = SimulatedConnector::new(inventory.clone())
        .login(&connection())
        .unwrap();

    let targets = resolve_targets(&session, Some("lab"), &names(&["web", "db"]))
        .await
        .unwrap();
    let err = LifecycleOrchestrator::new(&session, &SilentProgress)
        .power_down_and_destroy(&targets)
        .await
        .unwrap_err();

    assert_eq!(err.fault_message(), Some("VMware Tools is not running"));
    assert!(inventory.vm_exists("web"));
    assert!(inventory.vm_exists("db"));
    assert_eq!(session.active_filters(), 0);
}

#[tokio::test]
async fn test_destroying_a_running_vm_surfaces_invalid_power_state() {
    let inventory = lab_inventory(vec![VmSpec::new("web", PowerState::PoweredOn)]);
    let session = SimulatedConnector::new(inventory.clone())
        .login(&connection())
        .unwrap();
    let targets = resolve_targets(&session, None, &names(&["web"])).await.unwrap();

    let task = session.destroy(&targets.vms[0].moref).await.unwrap();
    let err = TaskWaiter::new(&session)
        .wait_for_tasks(&[task])
        .await
        .unwrap_err();

    match err {
        SweepError::TaskFailed { fault, .. } => assert_eq!(fault.kind, "InvalidPowerState"),
        other => panic!("Expected TaskFailed, got {:?}", other),
    }
    assert!(inventory.vm_exists("web"));
}

#[tokio::test]
async fn test_concurrent_sessions_do_not_see_each_others_filters() {
    let inventory = lab_inventory(vec![
        VmSpec::new("a", PowerState::PoweredOff),
        VmSpec::new("b", PowerState::PoweredOff),
    ]);
    let connector = SimulatedConnector::new(inventory.clone());
    let first = connector.login(&connection()).unwrap();
    let second = connector.login(&connection()).unwrap();
    assert_ne!(first.session_key(), second.session_key());

    let a = resolve_targets(&first, Some("lab"), &names(&["a"])).await.unwrap();
    let b = resolve_targets(&second, Some("lab"), &names(&["b"])).await.unwrap();

    let left_run = LifecycleOrchestrator::new(&first, &SilentProgress);
    let right_run = LifecycleOrchestrator::new(&second, &SilentProgress);
    let (left, right) = tokio::join!(
        left_run.power_down_and_destroy(&a),
        right_run.power_down_and_destroy(&b),
    );

    assert_eq!(left.unwrap().destroyed, 1);
    assert_eq!(right.unwrap().destroyed, 1);
    assert!(!inventory.vm_exists("a"));
    assert!(!inventory.vm_exists("b"));
}
