use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use vmsweep_core::error::{SweepError, SweepResult};
use vmsweep_core::types::PowerState;

fn default_task_duration() -> Duration {
    Duration::from_millis(50)
}

/// YAML description of a simulated inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryFile {
    /// Login accepted by the simulator; any login works when absent
    #[serde(default)]
    pub credentials: Option<Credentials>,

    /// Time from submission to terminal state for every task
    #[serde(default = "default_task_duration", with = "humantime_serde")]
    pub task_duration: Duration,

    /// VMs directly under the root folder
    #[serde(default)]
    pub vms: Vec<VmSpec>,

    #[serde(default)]
    pub folders: Vec<FolderSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderSpec {
    pub name: String,
    #[serde(default)]
    pub vms: Vec<VmSpec>,
    #[serde(default)]
    pub folders: Vec<FolderSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmSpec {
    pub name: String,
    #[serde(default)]
    pub power_state: PowerState,
    /// Fail the power-off task with this message
    #[serde(default)]
    pub fail_power_off: Option<String>,
    /// Fail the destroy task with this message
    #[serde(default)]
    pub fail_destroy: Option<String>,
}

impl Default for InventoryFile {
    fn default() -> Self {
        Self {
            credentials: None,
            task_duration: default_task_duration(),
            vms: Vec::new(),
            folders: Vec::new(),
        }
    }
}

impl VmSpec {
    pub fn new(name: impl Into<String>, power_state: PowerState) -> Self {
        Self {
            name: name.into(),
            power_state,
            fail_power_off: None,
            fail_destroy: None,
        }
    }
}

impl InventoryFile {
    pub fn from_yaml_str(contents: &str) -> SweepResult<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> SweepResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            SweepError::configuration(
                "inventory.path",
                format!("Failed to read {}: {}", path.as_ref().display(), e),
            )
        })?;
        Self::from_yaml_str(&contents)
    }
}
