//! Pending admin changes with an execution delay.
//!
//! A proposal records the proposed value and the time it was requested.
//! It becomes executable once the delay has elapsed. Re-proposing
//! overwrites the slot (and restarts the delay); cancelling clears it.
//! Callers re-validate the target state when they execute.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// PENDING CHANGE
// ═══════════════════════════════════════════════════════════════════════════════

/// A proposed value waiting for its delay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChange<T> {
    /// Proposed value
    pub value: T,
    /// Timestamp of the request
    pub requested_at: u64,
}

impl<T> PendingChange<T> {
    /// Create new pending change
    pub fn new(value: T, requested_at: u64) -> Self {
        Self { value, requested_at }
    }

    /// Earliest execution timestamp
    pub fn ready_at(&self, delay: u64) -> u64 {
        self.requested_at.saturating_add(delay)
    }

    /// Fail unless the delay has elapsed at `now`
    pub fn ensure_ready(&self, now: u64, delay: u64) -> Result<()> {
        let ready_at = self.ready_at(delay);
        if now < ready_at {
            return Err(Error::TimelockNotElapsed { ready_at, now });
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TIMELOCK SLOT
// ═══════════════════════════════════════════════════════════════════════════════

/// Single pending change for one admin knob
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelockSlot<T> {
    knob: String,
    pending: Option<PendingChange<T>>,
}

impl<T: Clone> TimelockSlot<T> {
    /// Create an empty slot
    pub fn new(knob: impl Into<String>) -> Self {
        Self {
            knob: knob.into(),
            pending: None,
        }
    }

    /// Record a proposal, replacing any previous one
    pub fn propose(&mut self, value: T, now: u64) {
        self.pending = Some(PendingChange::new(value, now));
    }

    /// Clear the proposal
    pub fn cancel(&mut self) -> Result<PendingChange<T>> {
        self.pending
            .take()
            .ok_or_else(|| Error::NoPendingChange(self.knob.clone()))
    }

    /// Pending proposal, if any
    pub fn pending(&self) -> Option<&PendingChange<T>> {
        self.pending.as_ref()
    }

    /// Value of a ready proposal; the slot is left intact
    pub fn ready_value(&self, now: u64, delay: u64) -> Result<T> {
        let pending = self
            .pending
            .as_ref()
            .ok_or_else(|| Error::NoPendingChange(self.knob.clone()))?;
        pending.ensure_ready(now, delay)?;
        Ok(pending.value.clone())
    }

    /// Clear after a successful execution
    pub fn clear(&mut self) {
        self.pending = None;
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TIMELOCK QUEUE
// ═══════════════════════════════════════════════════════════════════════════════

/// Keyed pending changes (e.g. one per token)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelockQueue<K: Ord, T> {
    knob: String,
    entries: BTreeMap<K, PendingChange<T>>,
}

impl<K: Ord + Copy + std::fmt::Display, T: Clone> TimelockQueue<K, T> {
    /// Create an empty queue
    pub fn new(knob: impl Into<String>) -> Self {
        Self {
            knob: knob.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Record a proposal for `key`, replacing any previous one
    pub fn propose(&mut self, key: K, value: T, now: u64) {
        self.entries.insert(key, PendingChange::new(value, now));
    }

    /// Clear the proposal for `key`
    pub fn cancel(&mut self, key: &K) -> Result<PendingChange<T>> {
        self.entries
            .remove(key)
            .ok_or_else(|| self.missing(key))
    }

    /// Pending proposal for `key`
    pub fn get(&self, key: &K) -> Option<&PendingChange<T>> {
        self.entries.get(key)
    }

    /// Value of a ready proposal; the entry is left intact
    pub fn ready_value(&self, key: &K, now: u64, delay: u64) -> Result<T> {
        let pending = self.entries.get(key).ok_or_else(|| self.missing(key))?;
        pending.ensure_ready(now, delay)?;
        Ok(pending.value.clone())
    }

    /// Clear after a successful execution
    pub fn clear(&mut self, key: &K) {
        self.entries.remove(key);
    }

    /// Number of pending proposals
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn missing(&self, key: &K) -> Error {
        Error::NoPendingChange(format!("{} {}", self.knob, key))
    }
}
