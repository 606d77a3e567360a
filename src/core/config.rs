//! Collateral and liquidation parameters.
//!
//! - Per-token collateral parameters, set through the timelocked admin
//!   path or the governance path, validated identically on both
//! - Liquidation parameters, set by governance

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::constants::*;

// ═══════════════════════════════════════════════════════════════════════════════
// COLLATERAL PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Risk parameters proposed for a collateral token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralParams {
    /// Share of value that may be borrowed against (bps)
    pub collateral_factor_bps: u64,
    /// Share of value counted toward the health factor (bps)
    pub liquidation_threshold_bps: u64,
    /// Bonus paid to liquidators on top of the repaid value (bps)
    pub liquidation_penalty_bps: u64,
}

impl CollateralParams {
    /// Create new collateral parameters
    pub fn new(
        collateral_factor_bps: u64,
        liquidation_threshold_bps: u64,
        liquidation_penalty_bps: u64,
    ) -> Self {
        Self {
            collateral_factor_bps,
            liquidation_threshold_bps,
            liquidation_penalty_bps,
        }
    }

    /// Check `0 < cf < lt <= 9500` and `100 <= penalty <= 2000`
    pub fn validate(&self) -> Result<()> {
        if self.collateral_factor_bps == 0 {
            return Err(invalid("collateral_factor_bps", "must be positive"));
        }
        if self.collateral_factor_bps >= self.liquidation_threshold_bps {
            return Err(invalid(
                "collateral_factor_bps",
                format!(
                    "{} must be below liquidation threshold {}",
                    self.collateral_factor_bps, self.liquidation_threshold_bps
                ),
            ));
        }
        if self.liquidation_threshold_bps > MAX_LIQUIDATION_THRESHOLD_BPS {
            return Err(invalid(
                "liquidation_threshold_bps",
                format!(
                    "{} exceeds maximum {}",
                    self.liquidation_threshold_bps, MAX_LIQUIDATION_THRESHOLD_BPS
                ),
            ));
        }
        if !(MIN_LIQUIDATION_PENALTY_BPS..=MAX_LIQUIDATION_PENALTY_BPS)
            .contains(&self.liquidation_penalty_bps)
        {
            return Err(invalid(
                "liquidation_penalty_bps",
                format!(
                    "{} outside [{}, {}]",
                    self.liquidation_penalty_bps,
                    MIN_LIQUIDATION_PENALTY_BPS,
                    MAX_LIQUIDATION_PENALTY_BPS
                ),
            ));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COLLATERAL CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

/// Stored configuration of a supported collateral token
///
/// A non-zero `collateral_factor_bps` marks the token as ever-added; it is
/// never reset, so disabling keeps the config and the token stays known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralConfig {
    /// Whether new deposits are accepted
    pub enabled: bool,
    /// Share of value that may be borrowed against (bps)
    pub collateral_factor_bps: u64,
    /// Share of value counted toward the health factor (bps)
    pub liquidation_threshold_bps: u64,
    /// Bonus paid to liquidators (bps)
    pub liquidation_penalty_bps: u64,
}

impl CollateralConfig {
    /// Enabled config from validated parameters
    pub fn from_params(params: CollateralParams) -> Self {
        Self {
            enabled: true,
            collateral_factor_bps: params.collateral_factor_bps,
            liquidation_threshold_bps: params.liquidation_threshold_bps,
            liquidation_penalty_bps: params.liquidation_penalty_bps,
        }
    }

    /// Replace risk parameters, keeping the enabled flag
    pub fn apply(&mut self, params: CollateralParams) {
        self.collateral_factor_bps = params.collateral_factor_bps;
        self.liquidation_threshold_bps = params.liquidation_threshold_bps;
        self.liquidation_penalty_bps = params.liquidation_penalty_bps;
    }

    /// Whether the token was ever added
    pub fn is_added(&self) -> bool {
        self.collateral_factor_bps > 0
    }

    /// Current risk parameters
    pub fn params(&self) -> CollateralParams {
        CollateralParams::new(
            self.collateral_factor_bps,
            self.liquidation_threshold_bps,
            self.liquidation_penalty_bps,
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIQUIDATION PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Governance-set liquidation sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationParams {
    /// Share of debt repayable per call above the full threshold (bps)
    pub close_factor_bps: u64,
    /// Health factor below which the whole debt may be repaid (bps)
    pub full_liquidation_threshold_bps: u64,
}

impl Default for LiquidationParams {
    fn default() -> Self {
        Self {
            close_factor_bps: DEFAULT_CLOSE_FACTOR_BPS,
            full_liquidation_threshold_bps: DEFAULT_FULL_LIQUIDATION_THRESHOLD_BPS,
        }
    }
}

impl LiquidationParams {
    /// Check a close factor: `0 < x <= 10000`
    pub fn validate_close_factor(bps: u64) -> Result<()> {
        if bps == 0 || bps > BPS_DIVISOR {
            return Err(invalid(
                "close_factor_bps",
                format!("{} outside (0, {}]", bps, BPS_DIVISOR),
            ));
        }
        Ok(())
    }

    /// Check a full-liquidation threshold: `0 < x < 10000`
    pub fn validate_full_liquidation_threshold(bps: u64) -> Result<()> {
        if bps == 0 || bps >= HEALTH_FACTOR_PARITY_BPS {
            return Err(invalid(
                "full_liquidation_threshold_bps",
                format!("{} outside (0, {})", bps, HEALTH_FACTOR_PARITY_BPS),
            ));
        }
        Ok(())
    }

    /// Validate both fields
    pub fn validate(&self) -> Result<()> {
        Self::validate_close_factor(self.close_factor_bps)?;
        Self::validate_full_liquidation_threshold(self.full_liquidation_threshold_bps)
    }
}

fn invalid(name: &str, reason: impl Into<String>) -> Error {
    Error::InvalidParameter {
        name: name.into(),
        reason: reason.into(),
    }
}
