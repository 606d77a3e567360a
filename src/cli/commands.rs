//! CLI Commands.
//!
//! Builds a single-borrower, single-collateral world from command-line
//! values and runs a liquidation (or a preview of one) against it.

use serde::{Deserialize, Serialize};

use super::config::CoreConfig;
use crate::core::config::CollateralParams;
use crate::core::vault::CollateralVault;
use crate::error::{Error, Result};
use crate::external::{
    BorrowLedger, CollateralView, InMemoryBorrowLedger, InMemoryTokenBank, StaticPriceOracle,
};
use crate::governance::access::Role;
use crate::liquidation::engine::{LiquidationEngine, LiquidationOutcome, SeizureQuote};
use crate::protocol::state_machine::ProtocolStateMachine;
use crate::utils::address::Address;
use crate::utils::constants::{BPS_DIVISOR, DEBT_TOKEN_DECIMALS};

/// State machine over the in-memory collaborators
pub type SimulatedProtocol =
    ProtocolStateMachine<InMemoryBorrowLedger, StaticPriceOracle, InMemoryTokenBank>;

/// Fixed start time for simulated worlds
const SIMULATION_START: u64 = 1_700_000_000;

// ═══════════════════════════════════════════════════════════════════════════════
// SCENARIO
// ═══════════════════════════════════════════════════════════════════════════════

/// One borrower with one collateral deposit and some debt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Collateral deposited, native units
    pub deposit: u128,
    /// Collateral decimals
    pub decimals: u8,
    /// USD price of one whole collateral token, 18 decimals
    pub price: u128,
    /// Liquidation threshold (bps)
    pub liquidation_threshold_bps: u64,
    /// Liquidation penalty (bps)
    pub liquidation_penalty_bps: u64,
    /// Borrower debt, 18 decimals
    pub debt: u128,
    /// Debt the liquidator offers to repay, 18 decimals
    pub repay: u128,
}

/// Well-known participants of a simulated world
#[derive(Debug, Clone, Copy)]
pub struct Actors {
    /// Deploys and administers both components
    pub admin: Address,
    /// Executes collateral additions
    pub governance: Address,
    /// Debt-side module allowed to withdraw
    pub borrow_module: Address,
    /// Liquidated account
    pub borrower: Address,
    /// Liquidating account
    pub liquidator: Address,
    /// Collateral token
    pub collateral: Address,
    /// Debt token
    pub debt_token: Address,
}

impl Default for Actors {
    fn default() -> Self {
        Self {
            admin: Address::from_label("admin"),
            governance: Address::from_label("governance"),
            borrow_module: Address::from_label("borrow-module"),
            borrower: Address::from_label("borrower"),
            liquidator: Address::from_label("liquidator"),
            collateral: Address::from_label("collateral"),
            debt_token: Address::from_label("musd"),
        }
    }
}

/// Everything `simulate` reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationReport {
    /// Simulated block time
    pub timestamp: u64,
    /// The completed liquidation
    pub outcome: LiquidationOutcome,
    /// Health factor afterwards (bps)
    pub health_factor_after: u64,
    /// Borrower debt afterwards
    pub remaining_debt: u128,
    /// Borrower collateral afterwards
    pub remaining_collateral: u128,
    /// Global bad debt afterwards
    pub total_bad_debt: u128,
}

/// Everything `estimate` reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimateReport {
    /// Simulated block time
    pub timestamp: u64,
    /// Current health factor (bps)
    pub health_factor: u64,
    /// Whether the borrower can be liquidated now
    pub liquidatable: bool,
    /// Close-factor limit on a single repayment
    pub max_repayable: u128,
    /// Seizure sizing for the requested repayment
    pub quote: SeizureQuote,
}

impl Scenario {
    /// Collateral parameters, with the collateral factor 5 points under the threshold
    pub fn collateral_params(&self) -> CollateralParams {
        let lt = self.liquidation_threshold_bps;
        CollateralParams::new(lt.saturating_sub(500).max(1), lt, self.liquidation_penalty_bps)
    }

    /// Build the world: collateral added, deposited, debt recorded,
    /// liquidator funded and approved
    pub fn build(&self, config: &CoreConfig, actors: &Actors) -> Result<SimulatedProtocol> {
        let vault_address = Address::from_label("vault");
        let engine_address = Address::from_label("liquidation-engine");

        let vault = CollateralVault::new(vault_address, actors.admin, actors.borrow_module)?;
        let engine = LiquidationEngine::with_params(
            engine_address,
            actors.debt_token,
            actors.admin,
            config.liquidation,
        )?;

        let mut bank = InMemoryTokenBank::new();
        bank.register_token(actors.collateral, self.decimals);
        bank.register_token(actors.debt_token, DEBT_TOKEN_DECIMALS);
        bank.mint(&actors.collateral, &actors.borrower, self.deposit)?;
        bank.approve(&actors.collateral, &actors.borrower, &vault_address, self.deposit);
        bank.mint(&actors.debt_token, &actors.liquidator, self.repay)?;
        bank.approve(&actors.debt_token, &actors.liquidator, &engine_address, self.repay);

        let mut oracle = StaticPriceOracle::new();
        oracle.set_price(actors.collateral, self.price, self.decimals);

        let mut ledger = InMemoryBorrowLedger::new();
        ledger.set_debt(actors.borrower, self.debt);

        let mut protocol = ProtocolStateMachine::new(
            vault,
            engine,
            ledger,
            oracle,
            bank,
            SIMULATION_START,
        );
        protocol.grant_vault_role(actors.admin, Role::Governance, actors.governance)?;
        protocol.grant_vault_role(actors.admin, Role::Liquidation, engine_address)?;
        protocol.add_collateral(actors.governance, actors.collateral, self.collateral_params())?;
        if self.deposit > 0 {
            protocol.deposit(actors.borrower, actors.collateral, self.deposit)?;
        }
        Ok(protocol)
    }

    /// Run the liquidation
    pub fn simulate(&self, config: &CoreConfig) -> Result<SimulationReport> {
        let actors = Actors::default();
        let mut protocol = self.build(config, &actors)?;
        let outcome =
            protocol.liquidate(actors.liquidator, actors.borrower, actors.collateral, self.repay)?;
        protocol.verify_invariants()?;

        Ok(SimulationReport {
            timestamp: protocol.timestamp(),
            health_factor_after: protocol.health_factor(&actors.borrower)?,
            remaining_debt: protocol.ledger().total_debt(&actors.borrower),
            remaining_collateral: protocol
                .vault()
                .deposit_of(&actors.borrower, &actors.collateral),
            total_bad_debt: protocol.engine().total_bad_debt(),
            outcome,
        })
    }

    /// Preview the liquidation without running it
    pub fn estimate(&self, config: &CoreConfig) -> Result<EstimateReport> {
        let actors = Actors::default();
        let protocol = self.build(config, &actors)?;
        let quote = protocol.estimate_seize(&actors.borrower, &actors.collateral, self.repay)?;

        Ok(EstimateReport {
            timestamp: protocol.timestamp(),
            health_factor: protocol.health_factor(&actors.borrower)?,
            liquidatable: protocol.is_liquidatable(&actors.borrower)?,
            max_repayable: protocol.max_repayable(&actors.borrower)?,
            quote,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSING
// ═══════════════════════════════════════════════════════════════════════════════

/// Parse a decimal string such as `"1.25"` into `decimals`-scaled units
pub fn parse_units(value: &str, decimals: u8) -> Result<u128> {
    let invalid = |reason: &str| Error::InvalidParameter {
        name: "amount".into(),
        reason: format!("{}: {}", reason, value),
    };

    let value = value.trim();
    let (whole, frac) = match value.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (value, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid("empty amount"));
    }
    if frac.len() > decimals as usize {
        return Err(invalid("too many decimal places"));
    }
    if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
        return Err(invalid("not a decimal number"));
    }

    let digits = format!("{}{:0<width$}", whole, frac, width = decimals as usize);
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(0);
    }
    digits.parse().map_err(|_| invalid("amount too large"))
}

/// Render a bps value as a percentage
pub fn bps_to_percent(bps: u64) -> String {
    format!("{}.{:02}%", bps / (BPS_DIVISOR / 100), bps % (BPS_DIVISOR / 100))
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
