//! Error handling for vmsweep
//!
//! All fallible operations in the workspace return [`SweepResult`]. The
//! error taxonomy is deliberately small:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                   vmsweep error taxonomy                   │
//! ├────────────────────────────────────────────────────────────┤
//! │  Task errors         │  Inventory errors   │  Local errors │
//! │  • TaskFailed        │  • InventoryFault   │  • Config     │
//! │                      │  • Connection       │  • IO         │
//! │                      │  • NotConnected     │  • Internal   │
//! │                      │  • NotFound         │               │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing in the workspace retries. A task failure aborts the batch being
//! waited on and every phase after it.

pub mod constructors;
pub mod conversions;
pub mod types;


pub use types::{SweepError, SweepResult};
