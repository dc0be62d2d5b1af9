//! Core error types for vmsweep

use thiserror::Error;

use crate::types::{TaskFault, TaskId};

/// Error type for every vmsweep operation
#[derive(Error, Debug)]
pub enum SweepError {
    // Task errors
    /// A monitored task finished in the error state.
    #[error("Task {task} failed: {fault}")]
    TaskFailed { task: TaskId, fault: TaskFault },

    // Inventory errors
    #[error("Inventory fault during '{operation}': {message}")]
    InventoryFault { operation: String, message: String },

    #[error("Connection error to {address}: {details}")]
    Connection { address: String, details: String },

    #[error("Inventory session is not connected")]
    NotConnected,

    #[error("Unable to locate {resource}")]
    NotFound { resource: String },

    // Local errors
    #[error("Configuration error in {component}: {message}")]
    ConfigurationError { component: String, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] Box<std::io::Error>),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

pub type SweepResult<T> = std::result::Result<T, SweepError>;
