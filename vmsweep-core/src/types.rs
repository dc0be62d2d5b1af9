use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Property name carrying the whole task-info record
pub const INFO_PROPERTY: &str = "info";

/// Property name carrying only the task state
pub const INFO_STATE_PROPERTY: &str = "info.state";

macro_rules! managed_ref {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

managed_ref!(
    /// Handle of one asynchronous server-side operation
    TaskId
);
managed_ref!(
    /// Handle of a virtual machine in the inventory
    VmRef
);
managed_ref!(
    /// Handle of a folder in the inventory
    FolderRef
);
managed_ref!(
    /// Handle of a server-side property filter
    FilterId
);
managed_ref!(
    /// Opaque token identifying the last update set a caller has seen
    UpdateVersion
);

/// Lifecycle state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskState {
    Queued,
    Running,
    Success,
    Error,
}

impl TaskState {
    /// No transitions happen after a terminal state
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Success | TaskState::Error)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Queued => write!(f, "queued"),
            TaskState::Running => write!(f, "running"),
            TaskState::Success => write!(f, "success"),
            TaskState::Error => write!(f, "error"),
        }
    }
}

/// Error payload reported by a failed task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFault {
    /// Fault type name, e.g. `InvalidPowerState`
    pub kind: String,
    pub message: String,
}

impl TaskFault {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for TaskFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Full task-info record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub key: TaskId,
    /// Operation name, e.g. `PowerOffVM_Task`
    pub operation: String,
    pub entity_name: Option<String>,
    pub state: TaskState,
    /// Present only when `state` is [`TaskState::Error`]
    pub error: Option<TaskFault>,
    pub queue_time: DateTime<Utc>,
    pub complete_time: Option<DateTime<Utc>>,
}

impl TaskInfo {
    pub fn queued(key: TaskId, operation: impl Into<String>, entity_name: Option<String>) -> Self {
        Self {
            key,
            operation: operation.into(),
            entity_name,
            state: TaskState::Queued,
            error: None,
            queue_time: Utc::now(),
            complete_time: None,
        }
    }
}

/// Value carried by a single property change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    TaskInfo(TaskInfo),
    TaskState(TaskState),
    Other(serde_json::Value),
}

/// One `(property name, new value)` pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyChange {
    pub name: String,
    pub value: PropertyValue,
}

impl PropertyChange {
    pub fn info(info: TaskInfo) -> Self {
        Self {
            name: INFO_PROPERTY.to_string(),
            value: PropertyValue::TaskInfo(info),
        }
    }

    pub fn state(state: TaskState) -> Self {
        Self {
            name: INFO_STATE_PROPERTY.to_string(),
            value: PropertyValue::TaskState(state),
        }
    }

    pub fn other(name: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            value: PropertyValue::Other(value),
        }
    }
}

/// Changes observed on one watched object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectUpdate {
    pub task: TaskId,
    pub changes: Vec<PropertyChange>,
}

/// A batch of change notifications plus the version to resume from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateSet {
    pub version: UpdateVersion,
    pub objects: Vec<ObjectUpdate>,
}

/// Registration request for a property filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub objects: BTreeSet<TaskId>,
    /// Track every property of the watched objects
    pub all_properties: bool,
    /// Report only the properties that changed after the initial set
    pub partial_updates: bool,
}

impl FilterSpec {
    /// Watch every property of the given tasks, reporting incremental changes
    pub fn for_tasks(tasks: impl IntoIterator<Item = TaskId>) -> Self {
        Self {
            objects: tasks.into_iter().collect(),
            all_properties: true,
            partial_updates: true,
        }
    }
}

/// Power state of a virtual machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PowerState {
    PoweredOn,
    #[default]
    PoweredOff,
    Suspended,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::PoweredOn => write!(f, "poweredOn"),
            PowerState::PoweredOff => write!(f, "poweredOff"),
            PowerState::Suspended => write!(f, "suspended"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualMachine {
    pub moref: VmRef,
    pub name: String,
    pub power_state: PowerState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub moref: FolderRef,
    pub name: String,
}
