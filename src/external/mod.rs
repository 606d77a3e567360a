//! Interfaces to the collaborators outside the collateral core.
//!
//! - `BorrowLedger`: debt balances and health factors
//! - `PriceOracle`: USD prices, with a circuit breaker on the primary reads
//! - `TokenBank`: token balances and transfers
//! - `CollateralView`: read access to deposits, implemented by the vault
//!
//! In-memory implementations with failure injection back the tests and
//! the CLI simulator.

pub mod bank;
pub mod ledger;
pub mod oracle;

pub use bank::*;
pub use ledger::*;
pub use oracle::*;

use crate::core::config::CollateralConfig;
use crate::error::Result;
use crate::utils::address::Address;

// ═══════════════════════════════════════════════════════════════════════════════
// TRAITS
// ═══════════════════════════════════════════════════════════════════════════════

/// Read-only view of custody state
pub trait CollateralView {
    /// Every token ever added, including disabled ones, in insertion order
    fn supported_tokens(&self) -> Vec<Address>;

    /// Stored config for a token
    fn collateral_config(&self, token: &Address) -> Option<CollateralConfig>;

    /// Deposit of `user` in `token`
    fn deposit_of(&self, user: &Address, token: &Address) -> u128;
}

/// USD price source
///
/// Prices are for one whole token, with 18 decimals. The primary reads
/// fail when the circuit breaker is open; the `_unsafe` reads bypass it.
pub trait PriceOracle {
    /// Breaker-checked price
    fn price(&self, token: &Address) -> Result<u128>;

    /// Price ignoring the breaker
    fn price_unsafe(&self, token: &Address) -> Result<u128>;

    /// Breaker-checked USD value of `amount` native units (18 decimals)
    fn value_usd(&self, token: &Address, amount: u128) -> Result<u128>;

    /// USD value ignoring the breaker
    fn value_usd_unsafe(&self, token: &Address, amount: u128) -> Result<u128>;
}

/// Debt ledger for borrowers
pub trait BorrowLedger {
    /// Outstanding debt of `user` (debt-token units)
    fn total_debt(&self, user: &Address) -> u128;

    /// Health factor in bps using breaker-checked prices; `u64::MAX` with no debt
    fn health_factor(
        &self,
        user: &Address,
        collateral: &dyn CollateralView,
        oracle: &dyn PriceOracle,
    ) -> Result<u64>;

    /// Health factor in bps ignoring the breaker
    fn health_factor_unsafe(
        &self,
        user: &Address,
        collateral: &dyn CollateralView,
        oracle: &dyn PriceOracle,
    ) -> Result<u64>;

    /// Reduce the debt of `user` by `amount`
    fn reduce_debt(&mut self, user: &Address, amount: u128) -> Result<()>;

    /// Write off `amount` against reserves, then suppliers
    fn absorb_bad_debt(&mut self, amount: u128) -> Result<()>;
}

/// Token balances and movements
///
/// Tokens may charge a fee on transfer; callers measure what arrived
/// instead of trusting the requested amount.
pub trait TokenBank {
    /// Balance of `account`
    fn balance_of(&self, token: &Address, account: &Address) -> u128;

    /// Decimals of `token`
    fn decimals(&self, token: &Address) -> Result<u8>;

    /// Move `amount` from `from` (the acting component's own account)
    fn transfer(&mut self, token: &Address, from: &Address, to: &Address, amount: u128)
        -> Result<()>;

    /// Pull `amount` from `from` using the allowance granted to `spender`
    fn transfer_from(
        &mut self,
        token: &Address,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<()>;

    /// Destroy `amount` held by `from`
    fn burn(&mut self, token: &Address, from: &Address, amount: u128) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// HEALTH READING
// ═══════════════════════════════════════════════════════════════════════════════

/// Outcome of the two-step health factor read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthReading {
    /// Breaker-checked read succeeded
    Primary(u64),
    /// Primary failed; breaker-bypassing read succeeded
    Fallback(u64),
    /// Both reads failed
    Unavailable,
}

impl HealthReading {
    /// Read primary, then fall back to the unsafe read
    pub fn read(
        ledger: &dyn BorrowLedger,
        user: &Address,
        collateral: &dyn CollateralView,
        oracle: &dyn PriceOracle,
    ) -> Self {
        match ledger.health_factor(user, collateral, oracle) {
            Ok(hf) => Self::Primary(hf),
            Err(_) => match ledger.health_factor_unsafe(user, collateral, oracle) {
                Ok(hf) => Self::Fallback(hf),
                Err(_) => Self::Unavailable,
            },
        }
    }

    /// Health factor, if any read succeeded
    pub fn value(&self) -> Option<u64> {
        match self {
            Self::Primary(hf) | Self::Fallback(hf) => Some(*hf),
            Self::Unavailable => None,
        }
    }
}
