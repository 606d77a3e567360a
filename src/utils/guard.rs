//! Call-scoped reentrancy guard.
//!
//! Every mutating entry point of a component acquires the component's guard
//! on entry. The returned token releases it on drop, so the guard is freed
//! on both the success and the error path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Guard excluding re-entry into a component's mutating entry points
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    entered: Arc<AtomicBool>,
}

impl ReentrancyGuard {
    /// Create a new, unlocked guard
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the guard for the duration of one call
    pub fn enter(&self) -> Result<GuardToken> {
        self.entered
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::ReentrantCall)?;
        Ok(GuardToken {
            entered: Arc::clone(&self.entered),
        })
    }

    /// Whether a call currently holds the guard
    pub fn is_entered(&self) -> bool {
        self.entered.load(Ordering::Acquire)
    }
}

// Snapshots get their own unlocked guard rather than sharing the live flag.
impl Clone for ReentrancyGuard {
    fn clone(&self) -> Self {
        Self::new()
    }
}

/// Held while a guarded call executes
#[derive(Debug)]
#[must_use = "the guard is released as soon as the token is dropped"]
pub struct GuardToken {
    entered: Arc<AtomicBool>,
}

impl Drop for GuardToken {
    fn drop(&mut self) {
        self.entered.store(false, Ordering::Release);
    }
}
