//! Call context passed to every entry point.

use serde::{Deserialize, Serialize};

use crate::utils::address::Address;

/// Who is calling, and when
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    /// Calling account
    pub caller: Address,
    /// Current timestamp (seconds)
    pub timestamp: u64,
}

impl CallContext {
    /// Create a new call context
    pub fn new(caller: Address, timestamp: u64) -> Self {
        Self { caller, timestamp }
    }

    /// Same timestamp, different caller
    pub fn as_caller(&self, caller: Address) -> Self {
        Self {
            caller,
            timestamp: self.timestamp,
        }
    }
}
