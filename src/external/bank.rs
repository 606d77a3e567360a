//! In-memory token bank.
//!
//! Tracks balances, allowances and decimals per token. Supports a
//! per-token transfer fee (the fee is destroyed) and frozen tokens whose
//! every movement fails, for exercising rollback paths.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::external::TokenBank;
use crate::utils::address::Address;
use crate::utils::constants::BPS_DIVISOR;
use crate::utils::math::{apply_bps, safe_add, safe_sub};

/// Token bank backed by maps
#[derive(Debug, Clone, Default)]
pub struct InMemoryTokenBank {
    balances: BTreeMap<Address, BTreeMap<Address, u128>>,
    allowances: BTreeMap<Address, BTreeMap<(Address, Address), u128>>,
    decimals: BTreeMap<Address, u8>,
    supply: BTreeMap<Address, u128>,
    fee_bps: BTreeMap<Address, u64>,
    frozen: BTreeSet<Address>,
}

impl InMemoryTokenBank {
    /// Create an empty bank
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token
    pub fn register_token(&mut self, token: Address, decimals: u8) {
        self.decimals.insert(token, decimals);
    }

    /// Charge `fee_bps` on every transfer of `token`
    pub fn set_transfer_fee(&mut self, token: Address, fee_bps: u64) -> Result<()> {
        if fee_bps > BPS_DIVISOR {
            return Err(Error::InvalidParameter {
                name: "fee_bps".into(),
                reason: format!("{} exceeds {}", fee_bps, BPS_DIVISOR),
            });
        }
        self.fee_bps.insert(token, fee_bps);
        Ok(())
    }

    /// Make every movement of `token` fail
    pub fn set_frozen(&mut self, token: Address, frozen: bool) {
        if frozen {
            self.frozen.insert(token);
        } else {
            self.frozen.remove(&token);
        }
    }

    /// Create `amount` for `to`
    pub fn mint(&mut self, token: &Address, to: &Address, amount: u128) -> Result<()> {
        self.ensure_known(token)?;
        let balance = self.balance_of(token, to);
        let supply = self.total_supply(token);
        let new_supply = safe_add(supply, amount)?;
        self.set_balance(token, to, safe_add(balance, amount)?);
        self.supply.insert(*token, new_supply);
        Ok(())
    }

    /// Allow `spender` to pull up to `amount` from `owner`
    pub fn approve(&mut self, token: &Address, owner: &Address, spender: &Address, amount: u128) {
        self.allowances
            .entry(*token)
            .or_default()
            .insert((*owner, *spender), amount);
    }

    /// Remaining allowance
    pub fn allowance(&self, token: &Address, owner: &Address, spender: &Address) -> u128 {
        self.allowances
            .get(token)
            .and_then(|a| a.get(&(*owner, *spender)))
            .copied()
            .unwrap_or(0)
    }

    /// Total supply of `token`
    pub fn total_supply(&self, token: &Address) -> u128 {
        self.supply.get(token).copied().unwrap_or(0)
    }

    fn ensure_known(&self, token: &Address) -> Result<()> {
        if !self.decimals.contains_key(token) {
            return Err(failed(token, "unknown token"));
        }
        Ok(())
    }

    fn ensure_movable(&self, token: &Address) -> Result<()> {
        self.ensure_known(token)?;
        if self.frozen.contains(token) {
            return Err(failed(token, "token frozen"));
        }
        Ok(())
    }

    fn set_balance(&mut self, token: &Address, account: &Address, amount: u128) {
        self.balances
            .entry(*token)
            .or_default()
            .insert(*account, amount);
    }

    fn move_balance(
        &mut self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<()> {
        let from_balance = self.balance_of(token, from);
        if from_balance < amount {
            return Err(failed(
                token,
                format!("balance {} below {}", from_balance, amount),
            ));
        }
        let fee = apply_bps(amount, self.fee_bps.get(token).copied().unwrap_or(0))?;
        let received = safe_sub(amount, fee)?;

        self.set_balance(token, from, from_balance - amount);
        let to_balance = self.balance_of(token, to);
        self.set_balance(token, to, safe_add(to_balance, received)?);
        if fee > 0 {
            let supply = self.total_supply(token);
            self.supply.insert(*token, supply.saturating_sub(fee));
        }
        Ok(())
    }
}

impl TokenBank for InMemoryTokenBank {
    fn balance_of(&self, token: &Address, account: &Address) -> u128 {
        self.balances
            .get(token)
            .and_then(|b| b.get(account))
            .copied()
            .unwrap_or(0)
    }

    fn decimals(&self, token: &Address) -> Result<u8> {
        self.decimals
            .get(token)
            .copied()
            .ok_or_else(|| failed(token, "unknown token"))
    }

    fn transfer(
        &mut self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<()> {
        self.ensure_movable(token)?;
        to.ensure_non_zero("to")?;
        self.move_balance(token, from, to, amount)
    }

    fn transfer_from(
        &mut self,
        token: &Address,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<()> {
        self.ensure_movable(token)?;
        to.ensure_non_zero("to")?;
        let allowance = self.allowance(token, from, spender);
        if allowance < amount {
            return Err(failed(
                token,
                format!("allowance {} below {}", allowance, amount),
            ));
        }
        self.move_balance(token, from, to, amount)?;
        self.approve(token, from, spender, allowance - amount);
        Ok(())
    }

    fn burn(&mut self, token: &Address, from: &Address, amount: u128) -> Result<()> {
        self.ensure_movable(token)?;
        let balance = self.balance_of(token, from);
        if balance < amount {
            return Err(failed(token, format!("balance {} below {}", balance, amount)));
        }
        self.set_balance(token, from, balance - amount);
        let supply = self.total_supply(token);
        self.supply.insert(*token, safe_sub(supply, amount)?);
        Ok(())
    }
}

fn failed(token: &Address, reason: impl Into<String>) -> Error {
    Error::TransferFailed {
        token: *token,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (InMemoryTokenBank, Address, Address, Address) {
        let mut bank = InMemoryTokenBank::new();
        let token = Address::from_label("weth");
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");
        bank.register_token(token, 18);
        bank.mint(&token, &alice, 1_000).unwrap();
        (bank, token, alice, bob)
    }

    #[test]
    fn test_transfer() {
        let (mut bank, token, alice, bob) = setup();
        bank.transfer(&token, &alice, &bob, 400).unwrap();
        assert_eq!(bank.balance_of(&token, &alice), 600);
        assert_eq!(bank.balance_of(&token, &bob), 400);
        assert!(bank.transfer(&token, &alice, &bob, 601).is_err());
    }

    #[test]
    fn test_transfer_from_uses_allowance() {
        let (mut bank, token, alice, bob) = setup();
        assert!(bank.transfer_from(&token, &bob, &alice, &bob, 1).is_err());

        bank.approve(&token, &alice, &bob, 300);
        bank.transfer_from(&token, &bob, &alice, &bob, 200).unwrap();
        assert_eq!(bank.allowance(&token, &alice, &bob), 100);
        assert_eq!(bank.balance_of(&token, &bob), 200);
    }

    #[test]
    fn test_fee_on_transfer() {
        let (mut bank, token, alice, bob) = setup();
        bank.set_transfer_fee(token, 100).unwrap(); // 1%
        bank.transfer(&token, &alice, &bob, 500).unwrap();

        assert_eq!(bank.balance_of(&token, &alice), 500);
        assert_eq!(bank.balance_of(&token, &bob), 495);
        assert_eq!(bank.total_supply(&token), 995);
    }

    #[test]
    fn test_frozen_token() {
        let (mut bank, token, alice, bob) = setup();
        bank.set_frozen(token, true);
        assert!(matches!(
            bank.transfer(&token, &alice, &bob, 1),
            Err(Error::TransferFailed { .. })
        ));
        assert!(bank.burn(&token, &alice, 1).is_err());
        bank.set_frozen(token, false);
        bank.burn(&token, &alice, 1).unwrap();
        assert_eq!(bank.total_supply(&token), 999);
    }
}
