//! Protocol constants and magic numbers.
//!
//! All protocol-wide constants are defined here for easy auditing and modification.

// ═══════════════════════════════════════════════════════════════════════════════
// BASIS POINTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Basis points divisor (10000 = 100%)
pub const BPS_DIVISOR: u64 = 10_000;

/// Health factor at parity (1.0x); positions below are liquidatable
pub const HEALTH_FACTOR_PARITY_BPS: u64 = 10_000;

/// Minimum health factor after an integrator withdrawal (1.10x)
///
/// The margin absorbs estimation error from reading the oracle once
/// for the post-withdrawal check.
pub const MIN_WITHDRAW_HEALTH_FACTOR_BPS: u64 = 11_000;

// ═══════════════════════════════════════════════════════════════════════════════
// COLLATERAL CONFIG BOUNDS
// ═══════════════════════════════════════════════════════════════════════════════

/// Maximum number of supported collateral tokens
pub const MAX_SUPPORTED_TOKENS: usize = 50;

/// Upper bound for a token's liquidation threshold - 95%
pub const MAX_LIQUIDATION_THRESHOLD_BPS: u64 = 9_500;

/// Minimum liquidation penalty - 1%
/// Keeps every liquidation profitable for the liquidator
pub const MIN_LIQUIDATION_PENALTY_BPS: u64 = 100;

/// Maximum liquidation penalty - 20%
pub const MAX_LIQUIDATION_PENALTY_BPS: u64 = 2_000;

// ═══════════════════════════════════════════════════════════════════════════════
// DEBT TOKEN
// ═══════════════════════════════════════════════════════════════════════════════

/// Decimals of the debt token (mUSD) and of oracle USD values
pub const DEBT_TOKEN_DECIMALS: u8 = 18;

/// One whole unit of the debt token
pub const DEBT_TOKEN_UNIT: u128 = 1_000_000_000_000_000_000;

/// Dust floor for a single liquidation - 100 mUSD
pub const MIN_LIQUIDATION_AMOUNT: u128 = 100 * DEBT_TOKEN_UNIT;

// ═══════════════════════════════════════════════════════════════════════════════
// LIQUIDATION DEFAULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default close factor - 50% of debt per call
pub const DEFAULT_CLOSE_FACTOR_BPS: u64 = 5_000;

/// Default full-liquidation threshold - below 0.5x health factor
pub const DEFAULT_FULL_LIQUIDATION_THRESHOLD_BPS: u64 = 5_000;

// ═══════════════════════════════════════════════════════════════════════════════
// TIME CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Delay before a pending admin change may execute - 48 hours
pub const ADMIN_CHANGE_DELAY_SECS: u64 = 48 * 3600;

// ═══════════════════════════════════════════════════════════════════════════════
// ADDRESS CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Length of an account/token address in bytes
pub const ADDRESS_LENGTH: usize = 20;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_penalty_bounds() {
        assert!(MIN_LIQUIDATION_PENALTY_BPS < MAX_LIQUIDATION_PENALTY_BPS);
        assert!(MAX_LIQUIDATION_PENALTY_BPS < BPS_DIVISOR);
    }

    #[test]
    fn test_health_factor_constants() {
        assert!(HEALTH_FACTOR_PARITY_BPS < MIN_WITHDRAW_HEALTH_FACTOR_BPS);
        assert!(MAX_LIQUIDATION_THRESHOLD_BPS < BPS_DIVISOR);
    }

    #[test]
    fn test_liquidation_defaults() {
        assert!(DEFAULT_CLOSE_FACTOR_BPS > 0 && DEFAULT_CLOSE_FACTOR_BPS <= BPS_DIVISOR);
        assert!(DEFAULT_FULL_LIQUIDATION_THRESHOLD_BPS < BPS_DIVISOR);
        assert_eq!(MIN_LIQUIDATION_AMOUNT, 100 * 10u128.pow(DEBT_TOKEN_DECIMALS as u32));
    }
}
