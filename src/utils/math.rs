//! Checked arithmetic for monetary calculations.
//!
//! Token amounts are `u128` in native decimals. Products that can exceed
//! `u128` (amount x bps x 10^decimals) are formed in 256 bits and divided
//! once, so every formula multiplies before it divides.

use primitive_types::U256;

use crate::error::{Error, Result};
use crate::utils::constants::BPS_DIVISOR;

// ═══════════════════════════════════════════════════════════════════════════════
// SAFE ARITHMETIC OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Safe addition with overflow check
pub fn safe_add(a: u128, b: u128) -> Result<u128> {
    a.checked_add(b).ok_or(Error::Overflow {
        operation: format!("{} + {}", a, b),
    })
}

/// Safe subtraction with underflow check
pub fn safe_sub(a: u128, b: u128) -> Result<u128> {
    a.checked_sub(b).ok_or(Error::Underflow {
        operation: format!("{} - {}", a, b),
    })
}

/// 10^decimals as u128
pub fn pow10(decimals: u8) -> Result<u128> {
    10u128.checked_pow(decimals as u32).ok_or(Error::Overflow {
        operation: format!("10^{}", decimals),
    })
}

/// Computes (a * b) / c with a 256-bit intermediate, rounding down
pub fn mul_div(a: u128, b: u128, c: u128) -> Result<u128> {
    if c == 0 {
        return Err(Error::InvalidParameter {
            name: "divisor".into(),
            reason: "division by zero".into(),
        });
    }
    // u128 * u128 always fits in 256 bits
    let result = U256::from(a) * U256::from(b) / U256::from(c);
    narrow(result, || format!("({} * {}) / {}", a, b, c))
}

/// Computes (a * b * c) / d with a 256-bit intermediate, rounding down
pub fn mul_mul_div(a: u128, b: u128, c: u128, d: u128) -> Result<u128> {
    if d == 0 {
        return Err(Error::InvalidParameter {
            name: "divisor".into(),
            reason: "division by zero".into(),
        });
    }
    let numerator = (U256::from(a) * U256::from(b))
        .checked_mul(U256::from(c))
        .ok_or_else(|| Error::Overflow {
            operation: format!("{} * {} * {}", a, b, c),
        })?;
    narrow(numerator / U256::from(d), || {
        format!("({} * {} * {}) / {}", a, b, c, d)
    })
}

/// Apply a basis-point fraction to an amount, rounding down
pub fn apply_bps(amount: u128, bps: u64) -> Result<u128> {
    mul_div(amount, bps as u128, BPS_DIVISOR as u128)
}

fn narrow(value: U256, describe: impl FnOnce() -> String) -> Result<u128> {
    if value > U256::from(u128::MAX) {
        return Err(Error::Overflow {
            operation: describe(),
        });
    }
    Ok(value.low_u128())
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIQUIDATION CALCULATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Collateral units owed for a repayment, including the liquidation penalty
///
/// `repay * (10000 + penalty) * 10^decimals / (10000 * price)`
///
/// # Arguments
/// * `repay` - Debt repaid, 18 decimals (1 unit = $1)
/// * `penalty_bps` - Liquidation penalty in basis points
/// * `price` - USD price of one whole collateral token, 18 decimals
/// * `decimals` - Collateral token decimals
pub fn collateral_for_repayment(
    repay: u128,
    penalty_bps: u64,
    price: u128,
    decimals: u8,
) -> Result<u128> {
    let denominator = (BPS_DIVISOR as u128)
        .checked_mul(price)
        .ok_or_else(|| Error::Overflow {
            operation: format!("{} * {}", BPS_DIVISOR, price),
        })?;
    mul_mul_div(
        repay,
        (BPS_DIVISOR + penalty_bps) as u128,
        pow10(decimals)?,
        denominator,
    )
}

/// Repayment a seizure of the given USD value can justify at the penalty
///
/// `value * 10000 / (10000 + penalty)`
pub fn repayment_for_value(value_usd: u128, penalty_bps: u64) -> Result<u128> {
    mul_div(
        value_usd,
        BPS_DIVISOR as u128,
        (BPS_DIVISOR + penalty_bps) as u128,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::constants::DEBT_TOKEN_UNIT;

    #[test]
    fn test_safe_arithmetic() {
        assert!(safe_add(1, 2).is_ok());
        assert!(safe_add(u128::MAX, 1).is_err());

        assert!(safe_sub(5, 3).is_ok());
        assert!(safe_sub(3, 5).is_err());
    }

    #[test]
    fn test_mul_div_wide_intermediate() {
        // 1e30 * 1e30 overflows u128 but the quotient fits
        let e30 = 10u128.pow(30);
        assert_eq!(mul_div(e30, e30, e30).unwrap(), e30);
        assert!(mul_div(1, 1, 0).is_err());
        assert!(mul_div(u128::MAX, 2, 1).is_err());
    }

    #[test]
    fn test_collateral_for_repayment_weth() {
        // 1000 mUSD at 5% penalty against $2000 WETH = 0.525 WETH
        let seize = collateral_for_repayment(
            1_000 * DEBT_TOKEN_UNIT,
            500,
            2_000 * DEBT_TOKEN_UNIT,
            18,
        )
        .unwrap();
        assert_eq!(seize, 525_000_000_000_000_000);
    }

    #[test]
    fn test_collateral_for_repayment_low_decimals() {
        // 1000 mUSD at 5% against $60,000 BTC with 8 decimals
        // = 1050 / 60000 BTC = 0.0175 BTC = 1_750_000 sats
        let seize = collateral_for_repayment(
            1_000 * DEBT_TOKEN_UNIT,
            500,
            60_000 * DEBT_TOKEN_UNIT,
            8,
        )
        .unwrap();
        assert_eq!(seize, 1_750_000);
    }

    #[test]
    fn test_repayment_for_value() {
        // $210 of collateral at 5% penalty backs $200 of repayment
        let repay = repayment_for_value(210 * DEBT_TOKEN_UNIT, 500).unwrap();
        assert_eq!(repay, 200 * DEBT_TOKEN_UNIT);
    }

    #[test]
    fn test_apply_bps() {
        assert_eq!(apply_bps(1_000, 5_000).unwrap(), 500);
        assert_eq!(apply_bps(1_000, 10_000).unwrap(), 1_000);
    }
}
