//! Constructor methods for SweepError

use super::types::SweepError;
use crate::types::{TaskFault, TaskId};

impl SweepError {
    /// Create a configuration error with component and message
    ///
    /// # Examples
    /// ```rust
    /// use vmsweep_core::error::SweepError;
    ///
    /// let err = SweepError::configuration("connection.port", "port must be non-zero");
    /// assert!(err.to_string().contains("connection.port"));
    /// ```
    pub fn configuration(component: impl Into<String>, message: impl Into<String>) -> Self {
        SweepError::ConfigurationError {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a fault raised by the inventory while performing `operation`
    pub fn inventory_fault(operation: impl Into<String>, message: impl Into<String>) -> Self {
        SweepError::InventoryFault {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn task_failed(task: TaskId, fault: TaskFault) -> Self {
        SweepError::TaskFailed { task, fault }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        SweepError::NotFound {
            resource: resource.into(),
        }
    }

    pub fn connection(address: impl Into<String>, details: impl Into<String>) -> Self {
        SweepError::Connection {
            address: address.into(),
            details: details.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        SweepError::Internal {
            message: message.into(),
        }
    }

    /// The fault message as reported by the inventory, if this error
    /// originated there.
    pub fn fault_message(&self) -> Option<&str> {
        match self {
            SweepError::TaskFailed { fault, .. } => Some(fault.message.as_str()),
            SweepError::InventoryFault { message, .. } => Some(message.as_str()),
            _ => None,
        }
    }
}
