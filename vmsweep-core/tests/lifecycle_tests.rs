// Power-off / destroy sequencing scenarios

use pretty_assertions::assert_eq;
use vmsweep_core::error::SweepError;
use vmsweep_core::lifecycle::{LifecycleOrchestrator, LifecycleReport, SilentProgress, TargetSet};
use vmsweep_core::test_helpers::{FakeInventory, RecordedCall, TaskKind};
use vmsweep_core::types::{PowerState, TaskFault};

fn call_names(calls: &[RecordedCall]) -> Vec<String> {
    calls.iter().map(|call| format!("{:?}", call)).collect()
}

#[tokio::test]
async fn test_running_vm_is_powered_off_before_both_are_destroyed() {
    let inventory = FakeInventory::new()
        .with_vm("a", PowerState::PoweredOn)
        .with_vm("b", PowerState::PoweredOff);
    let targets = TargetSet::new(None, vec![inventory.vm("a"), inventory.vm("b")]);

    let report = LifecycleOrchestrator::new(&inventory, &SilentProgress)
        .power_down_and_destroy(&targets)
        .await
        .unwrap();

    assert_eq!(
        report,
        LifecycleReport {
            powered_off: 1,
            destroyed: 2
        }
    );
    assert_eq!(
        inventory.calls(),
        vec![
            RecordedCall::PowerOff("a".to_string()),
            RecordedCall::CreateFilter(1),
            RecordedCall::DestroyFilter,
            RecordedCall::Destroy("a".to_string()),
            RecordedCall::Destroy("b".to_string()),
            RecordedCall::CreateFilter(2),
            RecordedCall::DestroyFilter,
        ]
    );
}

#[tokio::test]
async fn test_power_off_failure_skips_destroy_phase() {
    let inventory = FakeInventory::new()
        .with_vm("a", PowerState::PoweredOn)
        .failing(
            TaskKind::PowerOff,
            "a",
            TaskFault::new("InvalidPowerState", "VMware Tools not responding"),
        );
    let targets = TargetSet::new(None, vec![inventory.vm("a")]);

    let err = LifecycleOrchestrator::new(&inventory, &SilentProgress)
        .power_down_and_destroy(&targets)
        .await
        .unwrap_err();

    match err {
        SweepError::TaskFailed { fault, .. } => {
            assert_eq!(fault.message, "VMware Tools not responding")
        }
        other => panic!("Expected TaskFailed, got {:?}", other),
    }
    let calls = inventory.calls();
    assert!(
        !calls.iter().any(|call| matches!(call, RecordedCall::Destroy(_))),
        "destroy must not run after a failed power-off: {:?}",
        call_names(&calls)
    );
    assert_eq!(calls.last(), Some(&RecordedCall::DestroyFilter));
}

#[tokio::test]
async fn test_destroy_failure_is_surfaced() {
    let inventory = FakeInventory::new()
        .with_vm("a", PowerState::PoweredOff)
        .with_vm("b", PowerState::PoweredOff)
        .failing(TaskKind::Destroy, "b", TaskFault::new("SystemError", "disk locked"));
    let targets = TargetSet::new(None, vec![inventory.vm("a"), inventory.vm("b")]);

    let err = LifecycleOrchestrator::new(&inventory, &SilentProgress)
        .power_down_and_destroy(&targets)
        .await
        .unwrap_err();

    assert_eq!(err.fault_message(), Some("disk locked"));
    assert!(!inventory
        .calls()
        .iter()
        .any(|call| matches!(call, RecordedCall::PowerOff(_))));
}

#[tokio::test]
async fn test_empty_target_set_does_nothing() {
    let inventory = FakeInventory::new();

    let report = LifecycleOrchestrator::new(&inventory, &SilentProgress)
        .power_down_and_destroy(&TargetSet::default())
        .await
        .unwrap();

    assert_eq!(report, LifecycleReport::default());
    assert!(inventory.calls().is_empty());
}
