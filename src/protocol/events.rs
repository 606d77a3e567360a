//! Core events for state change notifications.
//!
//! Every state change of the vault or the liquidation engine is recorded
//! as a `CoreEvent`. Events carry the amounts and parameters involved so
//! balances and configuration can be rebuilt from history alone.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::config::CollateralParams;
use crate::governance::access::Role;
use crate::utils::address::Address;

/// Default number of events retained per component
pub const DEFAULT_MAX_EVENTS: usize = 10_000;

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Which timelocked knob an admin event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdminKnob {
    /// Adding a new collateral token
    AddCollateral(Address),
    /// Updating an existing collateral token
    UpdateCollateral(Address),
    /// Replacing the borrow module address
    BorrowModule,
}

/// All core event types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoreEvent {
    // Custody
    /// Collateral deposited by the user
    Deposited {
        user: Address,
        token: Address,
        /// Amount actually received
        amount: u128,
    },
    /// Collateral deposited by an integrator on behalf of a user
    DepositedFor {
        funder: Address,
        user: Address,
        token: Address,
        amount: u128,
    },
    /// Collateral released by the borrow module
    Withdrawn {
        user: Address,
        token: Address,
        amount: u128,
    },
    /// Collateral released by an integrator
    WithdrawnFor {
        operator: Address,
        user: Address,
        token: Address,
        amount: u128,
        recipient: Address,
        health_check_skipped: bool,
    },
    /// Collateral transferred to a liquidator
    Seized {
        user: Address,
        token: Address,
        amount: u128,
        liquidator: Address,
    },

    // Liquidation
    /// Position liquidated
    Liquidated {
        borrower: Address,
        liquidator: Address,
        token: Address,
        debt_repaid: u128,
        collateral_seized: u128,
    },
    /// Shortfall recorded as bad debt
    BadDebtRecorded {
        borrower: Address,
        amount: u128,
        total_bad_debt: u128,
    },
    /// Bad debt written off against reserves and suppliers
    BadDebtSocialized {
        borrower: Address,
        /// Recorded amount cleared
        recorded: u128,
        /// Amount actually absorbed by the ledger
        absorbed: u128,
    },
    /// Liquidation sizing changed
    LiquidationParamsUpdated {
        close_factor_bps: u64,
        full_liquidation_threshold_bps: u64,
    },

    // Administration
    /// Timelocked change proposed
    AdminChangeRequested {
        knob: AdminKnob,
        requested_at: u64,
        ready_at: u64,
    },
    /// Timelocked change cancelled
    AdminChangeCancelled { knob: AdminKnob },
    /// Collateral added or updated
    CollateralConfigured {
        token: Address,
        params: CollateralParams,
        /// True when added through the governance path
        via_governance: bool,
    },
    /// Borrow module replaced
    BorrowModuleChanged { previous: Address, current: Address },
    /// Collateral enabled or disabled
    CollateralStatusChanged { token: Address, enabled: bool },
    /// Role granted
    RoleGranted { role: Role, account: Address },
    /// Role revoked
    RoleRevoked { role: Role, account: Address },
    /// Pause toggled
    PauseChanged { paused: bool, by: Address },
}

impl CoreEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Deposited { .. } => "Deposited",
            Self::DepositedFor { .. } => "DepositedFor",
            Self::Withdrawn { .. } => "Withdrawn",
            Self::WithdrawnFor { .. } => "WithdrawnFor",
            Self::Seized { .. } => "Seized",
            Self::Liquidated { .. } => "Liquidated",
            Self::BadDebtRecorded { .. } => "BadDebtRecorded",
            Self::BadDebtSocialized { .. } => "BadDebtSocialized",
            Self::LiquidationParamsUpdated { .. } => "LiquidationParamsUpdated",
            Self::AdminChangeRequested { .. } => "AdminChangeRequested",
            Self::AdminChangeCancelled { .. } => "AdminChangeCancelled",
            Self::CollateralConfigured { .. } => "CollateralConfigured",
            Self::BorrowModuleChanged { .. } => "BorrowModuleChanged",
            Self::CollateralStatusChanged { .. } => "CollateralStatusChanged",
            Self::RoleGranted { .. } => "RoleGranted",
            Self::RoleRevoked { .. } => "RoleRevoked",
            Self::PauseChanged { .. } => "PauseChanged",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT LOG
// ═══════════════════════════════════════════════════════════════════════════════

/// Event with its position in the component's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencedEvent {
    /// Monotonic sequence number
    pub sequence: u64,
    /// Timestamp of the call that emitted it
    pub timestamp: u64,
    /// The event
    pub event: CoreEvent,
}

/// Bounded, sequenced event history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLog {
    next_sequence: u64,
    events: Vec<SequencedEvent>,
    max_events: usize,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EVENTS)
    }
}

impl EventLog {
    /// Create a log retaining at most `max_events`
    pub fn new(max_events: usize) -> Self {
        Self {
            next_sequence: 0,
            events: Vec::new(),
            max_events: max_events.max(1),
        }
    }

    /// Append an event, pruning the oldest beyond the limit
    pub fn add_event(&mut self, timestamp: u64, event: CoreEvent) {
        self.events.push(SequencedEvent {
            sequence: self.next_sequence,
            timestamp,
            event,
        });
        self.next_sequence += 1;

        if self.events.len() > self.max_events {
            self.events.drain(0..self.events.len() - self.max_events);
        }
    }

    /// Retained events, oldest first
    pub fn events(&self) -> &[SequencedEvent] {
        &self.events
    }

    /// Drain retained events; sequence numbering continues
    pub fn take_events(&mut self) -> Vec<SequencedEvent> {
        std::mem::take(&mut self.events)
    }

    /// Sequence number the next event will get
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Most recent event
    pub fn last(&self) -> Option<&CoreEvent> {
        self.events.last().map(|e| &e.event)
    }

    /// SHA256 over the retained events, hex encoded
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for entry in &self.events {
            hasher.update(bincode::serialize(entry).unwrap_or_default());
        }
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deposit(amount: u128) -> CoreEvent {
        CoreEvent::Deposited {
            user: Address::from_label("alice"),
            token: Address::from_label("weth"),
            amount,
        }
    }

    #[test]
    fn test_sequence_numbers() {
        let mut log = EventLog::default();
        log.add_event(10, deposit(1));
        log.add_event(11, deposit(2));

        let seqs: Vec<u64> = log.events().iter().map(|e| e.sequence).collect();
        assert_eq!(seqs, vec![0, 1]);
        assert_eq!(log.last().map(|e| e.event_type()), Some("Deposited"));
    }

    #[test]
    fn test_pruning_keeps_newest() {
        let mut log = EventLog::new(2);
        for i in 0..5 {
            log.add_event(i, deposit(i as u128));
        }
        assert_eq!(log.events().len(), 2);
        assert_eq!(log.events()[0].sequence, 3);
        assert_eq!(log.next_sequence(), 5);
    }

    #[test]
    fn test_take_events_continues_sequence() {
        let mut log = EventLog::default();
        log.add_event(0, deposit(1));
        assert_eq!(log.take_events().len(), 1);
        assert!(log.events().is_empty());

        log.add_event(1, deposit(2));
        assert_eq!(log.events()[0].sequence, 1);
    }

    #[test]
    fn test_digest_changes_with_history() {
        let mut log = EventLog::default();
        let empty = log.digest();
        log.add_event(0, deposit(1));
        assert_ne!(log.digest(), empty);
        assert_eq!(log.digest().len(), 64);
    }
}
