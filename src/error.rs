//! Error types for the mUSD collateral core.
//!
//! This module defines all error types used throughout the core,
//! providing clear and actionable error messages.

use thiserror::Error;

use crate::governance::access::Role;
use crate::utils::address::Address;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the collateral core
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ═══════════════════════════════════════════════════════════════════
    // Collateral Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Token was never added as collateral
    #[error("Token {0} is not a supported collateral")]
    TokenNotSupported(Address),

    /// Token is known but currently disabled
    #[error("Token {0} is disabled as collateral")]
    TokenDisabled(Address),

    /// Token has already been added
    #[error("Token {0} is already added as collateral")]
    TokenAlreadyAdded(Address),

    /// Supported token list is full
    #[error("Supported token limit of {max} reached")]
    TooManyTokens {
        /// Maximum number of supported tokens
        max: usize,
    },

    /// Deposit balance does not cover the request
    #[error("Insufficient deposit: required {required}, available {available}")]
    InsufficientDeposit {
        /// Requested amount
        required: u128,
        /// Available deposit
        available: u128,
    },

    /// Withdrawal would leave the position below the withdrawal margin
    #[error("Withdrawal would leave health factor {health_factor} below minimum {minimum}")]
    WithdrawalWouldUndercollateralize {
        /// Post-withdrawal health factor (bps)
        health_factor: u64,
        /// Required health factor (bps)
        minimum: u64,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Liquidation Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Liquidator and borrower are the same account
    #[error("Self-liquidation is not allowed")]
    SelfLiquidation,

    /// Repayment is below the economic floor
    #[error("Liquidation amount {amount} below minimum {minimum}")]
    DustLiquidation {
        /// Requested repayment
        amount: u128,
        /// Minimum repayment
        minimum: u128,
    },

    /// Position is at or above parity and cannot be liquidated
    #[error("Position is healthy (health factor {health_factor})")]
    PositionHealthy {
        /// Current health factor (bps)
        health_factor: u64,
    },

    /// Liquidation would seize nothing
    #[error("Nothing to seize")]
    NothingToSeize,

    /// No bad debt is recorded for the borrower
    #[error("No bad debt recorded for {0}")]
    NoBadDebt(Address),

    // ═══════════════════════════════════════════════════════════════════
    // External Dependency Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Oracle returned a zero price
    #[error("Invalid price for token {0}")]
    InvalidPrice(Address),

    /// Oracle circuit breaker is open
    #[error("Oracle circuit breaker open for token {0}")]
    CircuitBreakerOpen(Address),

    /// Both the primary and fallback health reads failed
    #[error("Oracle unavailable: health factor could not be determined")]
    OracleUnavailable,

    /// Borrow ledger rejected a call
    #[error("Borrow ledger error: {0}")]
    Ledger(String),

    /// Token transfer failed
    #[error("Transfer of token {token} failed: {reason}")]
    TransferFailed {
        /// Token being moved
        token: Address,
        /// Failure reason
        reason: String,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Authorization Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Caller does not hold the required capability
    #[error("Account {account} is missing role {role}")]
    MissingRole {
        /// Calling account
        account: Address,
        /// Required role
        role: Role,
    },

    /// Caller is not the configured module
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// Recipient not allowed for this withdrawal path
    #[error("Recipient {0} not allowed when skipping the health check")]
    InvalidRecipient(Address),

    // ═══════════════════════════════════════════════════════════════════
    // Validation Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Invalid input parameter
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Amount is zero
    #[error("Amount cannot be zero")]
    ZeroAmount,

    /// Address is zero
    #[error("Address cannot be zero: {0}")]
    ZeroAddress(String),

    /// Overflow in calculation
    #[error("Arithmetic overflow in {operation}")]
    Overflow {
        /// Operation that overflowed
        operation: String,
    },

    /// Underflow in calculation
    #[error("Arithmetic underflow in {operation}")]
    Underflow {
        /// Operation that underflowed
        operation: String,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Admin / Protocol State Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Component is paused
    #[error("Protocol is paused")]
    ProtocolPaused,

    /// No pending change for the knob
    #[error("No pending change: {0}")]
    NoPendingChange(String),

    /// Timelock delay has not elapsed
    #[error("Timelock not elapsed: executable at {ready_at}, now {now}")]
    TimelockNotElapsed {
        /// Earliest execution timestamp
        ready_at: u64,
        /// Current timestamp
        now: u64,
    },

    /// Invariant violation detected
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    // ═══════════════════════════════════════════════════════════════════
    // Serialization Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ═══════════════════════════════════════════════════════════════════
    // Internal Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Mutating entry point re-entered while executing
    #[error("Reentrant call rejected")]
    ReentrantCall,

    /// Internal error (should not happen in production)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns true if the caller may succeed by retrying later
    /// (after an oracle recovers, a deposit lands, or the timelock elapses)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::InsufficientDeposit { .. }
                | Error::CircuitBreakerOpen(_)
                | Error::OracleUnavailable
                | Error::TimelockNotElapsed { .. }
                | Error::ProtocolPaused
                | Error::PositionHealthy { .. }
        )
    }

    /// Returns true if this is a critical error requiring immediate attention
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Error::InvariantViolation(_)
                | Error::Internal(_)
                | Error::Overflow { .. }
                | Error::Underflow { .. }
        )
    }

    /// Returns the error code for external systems
    pub fn code(&self) -> u32 {
        match self {
            // Collateral errors: 1xxx
            Error::TokenNotSupported(_) => 1001,
            Error::TokenDisabled(_) => 1002,
            Error::TokenAlreadyAdded(_) => 1003,
            Error::TooManyTokens { .. } => 1004,
            Error::InsufficientDeposit { .. } => 1005,
            Error::WithdrawalWouldUndercollateralize { .. } => 1006,

            // Liquidation errors: 2xxx
            Error::SelfLiquidation => 2001,
            Error::DustLiquidation { .. } => 2002,
            Error::PositionHealthy { .. } => 2003,
            Error::NothingToSeize => 2004,
            Error::NoBadDebt(_) => 2005,

            // External dependency errors: 3xxx
            Error::InvalidPrice(_) => 3001,
            Error::CircuitBreakerOpen(_) => 3002,
            Error::OracleUnavailable => 3003,
            Error::Ledger(_) => 3004,
            Error::TransferFailed { .. } => 3005,

            // Authorization errors: 4xxx
            Error::MissingRole { .. } => 4001,
            Error::Unauthorized(_) => 4002,
            Error::InvalidRecipient(_) => 4003,

            // Validation errors: 5xxx
            Error::InvalidParameter { .. } => 5001,
            Error::ZeroAmount => 5002,
            Error::ZeroAddress(_) => 5003,
            Error::Overflow { .. } => 5004,
            Error::Underflow { .. } => 5005,

            // Admin/protocol errors: 6xxx
            Error::ProtocolPaused => 6001,
            Error::NoPendingChange(_) => 6002,
            Error::TimelockNotElapsed { .. } => 6003,
            Error::InvariantViolation(_) => 6004,

            // Serialization errors: 7xxx
            Error::Serialization(_) => 7001,
            Error::Deserialization(_) => 7002,

            // Internal errors: 9xxx
            Error::ReentrantCall => 9001,
            Error::Internal(_) => 9002,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_unique() {
        let token = Address::from_label("weth");
        let codes = vec![
            Error::TokenNotSupported(token).code(),
            Error::InsufficientDeposit { required: 0, available: 0 }.code(),
            Error::PositionHealthy { health_factor: 0 }.code(),
            Error::OracleUnavailable.code(),
            Error::MissingRole { account: token, role: Role::Admin }.code(),
            Error::ZeroAmount.code(),
            Error::ProtocolPaused.code(),
            Error::Serialization("".into()).code(),
            Error::ReentrantCall.code(),
        ];

        let mut unique_codes = codes.clone();
        unique_codes.sort();
        unique_codes.dedup();

        assert_eq!(codes.len(), unique_codes.len(), "Error codes must be unique");
    }

    #[test]
    fn test_error_display() {
        let err = Error::InsufficientDeposit {
            required: 1000,
            available: 500,
        };
        assert!(err.to_string().contains("1000"));
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::OracleUnavailable.is_recoverable());
        assert!(!Error::SelfLiquidation.is_recoverable());
    }

    #[test]
    fn test_is_critical() {
        assert!(Error::InvariantViolation("test".into()).is_critical());
        assert!(Error::Overflow { operation: "test".into() }.is_critical());
        assert!(!Error::NothingToSeize.is_critical());
    }
}
