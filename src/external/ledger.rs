//! In-memory borrow ledger.
//!
//! Holds debts, protocol reserves and supplier deposits. The health
//! factor is the threshold-weighted USD value of every supported
//! collateral (disabled tokens included) over the debt, in bps.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::external::{BorrowLedger, CollateralView, PriceOracle};
use crate::utils::address::Address;
use crate::utils::constants::BPS_DIVISOR;
use crate::utils::math::{mul_div, safe_add};

/// Borrow ledger backed by maps
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryBorrowLedger {
    debts: BTreeMap<Address, u128>,
    /// Protocol reserves, first loss for bad debt
    reserves: u128,
    /// Supplier deposits, second loss for bad debt
    total_supplied: u128,
    /// Cumulative write-offs taken by suppliers
    supplier_haircut: u128,
    /// When set, `reduce_debt` fails
    reject_reductions: bool,
}

impl InMemoryBorrowLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Record debt for a user
    pub fn set_debt(&mut self, user: Address, amount: u128) {
        if amount == 0 {
            self.debts.remove(&user);
        } else {
            self.debts.insert(user, amount);
        }
    }

    /// Set protocol reserves
    pub fn set_reserves(&mut self, reserves: u128) {
        self.reserves = reserves;
    }

    /// Set supplier deposits
    pub fn set_total_supplied(&mut self, supplied: u128) {
        self.total_supplied = supplied;
    }

    /// Make `reduce_debt` fail
    pub fn set_reject_reductions(&mut self, reject: bool) {
        self.reject_reductions = reject;
    }

    /// Protocol reserves
    pub fn reserves(&self) -> u128 {
        self.reserves
    }

    /// Supplier deposits
    pub fn total_supplied(&self) -> u128 {
        self.total_supplied
    }

    /// Cumulative supplier write-offs
    pub fn supplier_haircut(&self) -> u128 {
        self.supplier_haircut
    }

    /// Sum of all debts
    pub fn total_system_debt(&self) -> u128 {
        self.debts.values().fold(0u128, |acc, d| acc.saturating_add(*d))
    }

    fn compute_health<F>(
        &self,
        user: &Address,
        collateral: &dyn CollateralView,
        value_of: F,
    ) -> Result<u64>
    where
        F: Fn(&Address, u128) -> Result<u128>,
    {
        let debt = self.total_debt(user);
        if debt == 0 {
            return Ok(u64::MAX);
        }

        let mut weighted = 0u128;
        for token in collateral.supported_tokens() {
            let amount = collateral.deposit_of(user, &token);
            if amount == 0 {
                continue;
            }
            let config = match collateral.collateral_config(&token) {
                Some(config) => config,
                None => continue,
            };
            let value = value_of(&token, amount)?;
            let counted = mul_div(
                value,
                config.liquidation_threshold_bps as u128,
                BPS_DIVISOR as u128,
            )?;
            weighted = safe_add(weighted, counted)?;
        }

        let hf = mul_div(weighted, BPS_DIVISOR as u128, debt)?;
        Ok(hf.min(u64::MAX as u128) as u64)
    }
}

impl BorrowLedger for InMemoryBorrowLedger {
    fn total_debt(&self, user: &Address) -> u128 {
        self.debts.get(user).copied().unwrap_or(0)
    }

    fn health_factor(
        &self,
        user: &Address,
        collateral: &dyn CollateralView,
        oracle: &dyn PriceOracle,
    ) -> Result<u64> {
        self.compute_health(user, collateral, |token, amount| {
            oracle.value_usd(token, amount)
        })
    }

    fn health_factor_unsafe(
        &self,
        user: &Address,
        collateral: &dyn CollateralView,
        oracle: &dyn PriceOracle,
    ) -> Result<u64> {
        self.compute_health(user, collateral, |token, amount| {
            oracle.value_usd_unsafe(token, amount)
        })
    }

    fn reduce_debt(&mut self, user: &Address, amount: u128) -> Result<()> {
        if self.reject_reductions {
            return Err(Error::Ledger("debt reductions rejected".into()));
        }
        let debt = self.total_debt(user);
        if amount > debt {
            return Err(Error::Ledger(format!(
                "reduction {} exceeds debt {} of {}",
                amount, debt, user
            )));
        }
        self.set_debt(*user, debt - amount);
        Ok(())
    }

    fn absorb_bad_debt(&mut self, amount: u128) -> Result<()> {
        let from_reserves = amount.min(self.reserves);
        let remainder = amount - from_reserves;
        if remainder > self.total_supplied {
            return Err(Error::Ledger(format!(
                "bad debt {} exceeds reserves {} and supply {}",
                amount, self.reserves, self.total_supplied
            )));
        }
        self.reserves -= from_reserves;
        self.total_supplied -= remainder;
        self.supplier_haircut = safe_add(self.supplier_haircut, remainder)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{CollateralConfig, CollateralParams};
    use crate::external::StaticPriceOracle;
    use crate::utils::constants::DEBT_TOKEN_UNIT;

    struct OneToken {
        token: Address,
        user: Address,
        amount: u128,
    }

    impl CollateralView for OneToken {
        fn supported_tokens(&self) -> Vec<Address> {
            vec![self.token]
        }

        fn collateral_config(&self, _token: &Address) -> Option<CollateralConfig> {
            Some(CollateralConfig::from_params(CollateralParams::new(7_500, 8_000, 500)))
        }

        fn deposit_of(&self, user: &Address, _token: &Address) -> u128 {
            if *user == self.user {
                self.amount
            } else {
                0
            }
        }
    }

    fn world() -> (InMemoryBorrowLedger, StaticPriceOracle, OneToken) {
        let token = Address::from_label("weth");
        let user = Address::from_label("alice");
        let mut oracle = StaticPriceOracle::new();
        oracle.set_price(token, 2_000 * DEBT_TOKEN_UNIT, 18);
        let view = OneToken {
            token,
            user,
            amount: 10 * DEBT_TOKEN_UNIT,
        };
        (InMemoryBorrowLedger::new(), oracle, view)
    }

    #[test]
    fn test_health_factor() {
        let (mut ledger, oracle, view) = world();
        assert_eq!(ledger.health_factor(&view.user, &view, &oracle).unwrap(), u64::MAX);

        // $20,000 * 80% / $16,000 = 1.0
        ledger.set_debt(view.user, 16_000 * DEBT_TOKEN_UNIT);
        assert_eq!(ledger.health_factor(&view.user, &view, &oracle).unwrap(), 10_000);
    }

    #[test]
    fn test_breaker_fails_primary_only() {
        let (mut ledger, mut oracle, view) = world();
        ledger.set_debt(view.user, 8_000 * DEBT_TOKEN_UNIT);
        oracle.set_breaker(view.token, true);

        assert!(ledger.health_factor(&view.user, &view, &oracle).is_err());
        assert_eq!(
            ledger.health_factor_unsafe(&view.user, &view, &oracle).unwrap(),
            20_000
        );
    }

    #[test]
    fn test_reduce_debt_checked() {
        let (mut ledger, _, view) = world();
        ledger.set_debt(view.user, 100);
        assert!(ledger.reduce_debt(&view.user, 101).is_err());
        ledger.reduce_debt(&view.user, 100).unwrap();
        assert_eq!(ledger.total_debt(&view.user), 0);
    }

    #[test]
    fn test_absorb_reserves_first() {
        let mut ledger = InMemoryBorrowLedger::new();
        ledger.set_reserves(100);
        ledger.set_total_supplied(1_000);

        ledger.absorb_bad_debt(250).unwrap();
        assert_eq!(ledger.reserves(), 0);
        assert_eq!(ledger.total_supplied(), 850);
        assert_eq!(ledger.supplier_haircut(), 150);

        assert!(ledger.absorb_bad_debt(10_000).is_err());
    }
}
