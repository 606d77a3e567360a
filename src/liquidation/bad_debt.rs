//! Bad-debt accounting.
//!
//! Shortfalls left by capped liquidations are tracked per borrower and in
//! a global total. The total always equals the sum of the per-borrower
//! records once an operation completes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::utils::address::Address;
use crate::utils::math::{safe_add, safe_sub};

/// Per-borrower and global bad debt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadDebtBook {
    total: u128,
    by_borrower: BTreeMap<Address, u128>,
}

impl BadDebtBook {
    /// Create an empty book
    pub fn new() -> Self {
        Self::default()
    }

    /// Global bad debt
    pub fn total(&self) -> u128 {
        self.total
    }

    /// Bad debt recorded against `borrower`
    pub fn of(&self, borrower: &Address) -> u128 {
        self.by_borrower.get(borrower).copied().unwrap_or(0)
    }

    /// Borrowers with outstanding bad debt
    pub fn borrowers(&self) -> impl Iterator<Item = (&Address, &u128)> {
        self.by_borrower.iter()
    }

    /// Add a shortfall; returns the new global total
    pub fn record(&mut self, borrower: Address, amount: u128) -> Result<u128> {
        let total = safe_add(self.total, amount)?;
        let own = safe_add(self.of(&borrower), amount)?;
        self.total = total;
        self.by_borrower.insert(borrower, own);
        Ok(total)
    }

    /// Clear the borrower's record; returns the amount cleared
    pub fn clear(&mut self, borrower: &Address) -> Result<u128> {
        let recorded = self.of(borrower);
        if recorded == 0 {
            return Err(Error::NoBadDebt(*borrower));
        }
        self.total = safe_sub(self.total, recorded)?;
        self.by_borrower.remove(borrower);
        Ok(recorded)
    }

    /// Check total == sum of per-borrower records
    pub fn verify_invariant(&self) -> Result<()> {
        let sum = self
            .by_borrower
            .values()
            .try_fold(0u128, |acc, v| safe_add(acc, *v))?;
        if sum != self.total {
            return Err(Error::InvariantViolation(format!(
                "bad debt total {} != sum of borrowers {}",
                self.total, sum
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_clear() {
        let mut book = BadDebtBook::new();
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");

        assert_eq!(book.record(alice, 100).unwrap(), 100);
        assert_eq!(book.record(bob, 50).unwrap(), 150);
        assert_eq!(book.record(alice, 25).unwrap(), 175);
        assert_eq!(book.of(&alice), 125);
        assert!(book.verify_invariant().is_ok());

        assert_eq!(book.clear(&alice).unwrap(), 125);
        assert_eq!(book.total(), 50);
        assert_eq!(book.of(&alice), 0);
        assert!(book.verify_invariant().is_ok());
    }

    #[test]
    fn test_clear_without_debt() {
        let mut book = BadDebtBook::new();
        let alice = Address::from_label("alice");
        assert_eq!(book.clear(&alice), Err(Error::NoBadDebt(alice)));
    }
}
