//! Static price oracle.
//!
//! Prices are set explicitly. A per-token circuit breaker makes the
//! breaker-checked reads fail while the `_unsafe` reads keep answering;
//! a feed marked down fails both.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::external::PriceOracle;
use crate::utils::address::Address;
use crate::utils::math::{mul_div, pow10};

/// Price of one whole token and the token's decimals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceEntry {
    /// USD price, 18 decimals
    pub price: u128,
    /// Token decimals
    pub decimals: u8,
}

/// Oracle answering from a fixed price table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticPriceOracle {
    prices: BTreeMap<Address, PriceEntry>,
    breaker_open: BTreeSet<Address>,
    feed_down: BTreeSet<Address>,
}

impl StaticPriceOracle {
    /// Create an empty oracle
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the price of `token`
    pub fn set_price(&mut self, token: Address, price: u128, decimals: u8) {
        self.prices.insert(token, PriceEntry { price, decimals });
    }

    /// Open or close the circuit breaker for `token`
    pub fn set_breaker(&mut self, token: Address, open: bool) {
        if open {
            self.breaker_open.insert(token);
        } else {
            self.breaker_open.remove(&token);
        }
    }

    /// Mark the feed for `token` down (both read paths fail)
    pub fn set_feed_down(&mut self, token: Address, down: bool) {
        if down {
            self.feed_down.insert(token);
        } else {
            self.feed_down.remove(&token);
        }
    }

    fn entry(&self, token: &Address) -> Result<PriceEntry> {
        if self.feed_down.contains(token) {
            return Err(Error::InvalidPrice(*token));
        }
        self.prices
            .get(token)
            .copied()
            .ok_or(Error::InvalidPrice(*token))
    }

    fn checked_entry(&self, token: &Address) -> Result<PriceEntry> {
        if self.breaker_open.contains(token) {
            return Err(Error::CircuitBreakerOpen(*token));
        }
        self.entry(token)
    }

    fn value_of(entry: PriceEntry, amount: u128) -> Result<u128> {
        mul_div(amount, entry.price, pow10(entry.decimals)?)
    }
}

impl PriceOracle for StaticPriceOracle {
    fn price(&self, token: &Address) -> Result<u128> {
        Ok(self.checked_entry(token)?.price)
    }

    fn price_unsafe(&self, token: &Address) -> Result<u128> {
        Ok(self.entry(token)?.price)
    }

    fn value_usd(&self, token: &Address, amount: u128) -> Result<u128> {
        Self::value_of(self.checked_entry(token)?, amount)
    }

    fn value_usd_unsafe(&self, token: &Address, amount: u128) -> Result<u128> {
        Self::value_of(self.entry(token)?, amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::constants::DEBT_TOKEN_UNIT;

    #[test]
    fn test_value_usd_scales_by_decimals() {
        let mut oracle = StaticPriceOracle::new();
        let wbtc = Address::from_label("wbtc");
        oracle.set_price(wbtc, 60_000 * DEBT_TOKEN_UNIT, 8);

        // 0.5 BTC
        assert_eq!(
            oracle.value_usd(&wbtc, 50_000_000).unwrap(),
            30_000 * DEBT_TOKEN_UNIT
        );
    }

    #[test]
    fn test_breaker_only_blocks_primary() {
        let mut oracle = StaticPriceOracle::new();
        let weth = Address::from_label("weth");
        oracle.set_price(weth, 2_000 * DEBT_TOKEN_UNIT, 18);
        oracle.set_breaker(weth, true);

        assert_eq!(oracle.price(&weth), Err(Error::CircuitBreakerOpen(weth)));
        assert_eq!(oracle.price_unsafe(&weth).unwrap(), 2_000 * DEBT_TOKEN_UNIT);

        oracle.set_feed_down(weth, true);
        assert!(oracle.price_unsafe(&weth).is_err());
    }

    #[test]
    fn test_unknown_token() {
        let oracle = StaticPriceOracle::new();
        let token = Address::from_label("nope");
        assert_eq!(oracle.price_unsafe(&token), Err(Error::InvalidPrice(token)));
    }
}
