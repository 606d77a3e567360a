//! Liquidation Engine for the collateral core.
//!
//! This module handles liquidation of unhealthy positions:
//! - Eligibility and close-factor sizing
//! - Seizure sizing from the collateral's penalty and price
//! - Capping at the available deposit, with the shortfall recorded as bad debt
//! - Settlement: pull and burn the repayment, seize, reduce the debt
//! - Governance write-off of recorded bad debt

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::config::LiquidationParams;
use crate::core::context::CallContext;
use crate::core::vault::CollateralVault;
use crate::error::{Error, Result};
use crate::external::{BorrowLedger, CollateralView, PriceOracle, TokenBank};
use crate::governance::access::{AccessControl, Role};
use crate::liquidation::bad_debt::BadDebtBook;
use crate::protocol::events::{CoreEvent, EventLog, SequencedEvent};
use crate::utils::address::Address;
use crate::utils::constants::*;
use crate::utils::guard::ReentrancyGuard;
use crate::utils::math::*;

// ═══════════════════════════════════════════════════════════════════════════════
// RESULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Sizing of a seizure for a given repayment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeizureQuote {
    /// Debt the liquidator repays (after capping)
    pub debt_to_repay: u128,
    /// Collateral transferred to the liquidator (native units)
    pub collateral_to_seize: u128,
    /// Shortfall that would be recorded as bad debt
    pub bad_debt: u128,
    /// Whether the seizure was capped at the borrower's deposit
    pub capped: bool,
}

/// Result of a completed liquidation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationOutcome {
    /// Liquidated borrower
    pub borrower: Address,
    /// Liquidator paid in collateral
    pub liquidator: Address,
    /// Collateral token seized
    pub token: Address,
    /// Health factor before liquidation (bps)
    pub health_factor_before: u64,
    /// Debt repaid and burned
    pub debt_repaid: u128,
    /// Collateral seized
    pub collateral_seized: u128,
    /// Bad debt recorded by this liquidation
    pub bad_debt_recorded: u128,
}

/// Liquidation statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationStats {
    /// Total liquidations performed
    pub total_liquidations: u64,
    /// Total debt repaid through liquidations
    pub total_debt_repaid: u128,
    /// Liquidations that hit the deposit cap
    pub capped_liquidations: u64,
    /// Bad debt written off so far
    pub total_bad_debt_socialized: u128,
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIQUIDATION ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Engine for liquidating unhealthy positions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationEngine {
    /// Account that receives and burns repayments
    address: Address,
    /// The 18-decimal debt token
    debt_token: Address,
    access: AccessControl,
    params: LiquidationParams,
    bad_debt: BadDebtBook,
    stats: LiquidationStats,
    paused: bool,
    events: EventLog,
    #[serde(skip)]
    guard: ReentrancyGuard,
}

impl LiquidationEngine {
    /// Create an engine at `address` with default parameters
    pub fn new(address: Address, debt_token: Address, admin: Address) -> Result<Self> {
        Self::with_params(address, debt_token, admin, LiquidationParams::default())
    }

    /// Create an engine with explicit parameters
    pub fn with_params(
        address: Address,
        debt_token: Address,
        admin: Address,
        params: LiquidationParams,
    ) -> Result<Self> {
        address.ensure_non_zero("engine")?;
        debt_token.ensure_non_zero("debt_token")?;
        params.validate()?;
        Ok(Self {
            address,
            debt_token,
            access: AccessControl::new(admin)?,
            params,
            bad_debt: BadDebtBook::new(),
            stats: LiquidationStats::default(),
            paused: false,
            events: EventLog::default(),
            guard: ReentrancyGuard::new(),
        })
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Liquidation
    // ───────────────────────────────────────────────────────────────────────────

    /// Repay up to `amount` of `borrower`'s debt for discounted `token` collateral
    ///
    /// Settlement is all-or-nothing: if any step fails, the vault, ledger
    /// and bank are restored to their state before the call.
    #[allow(clippy::too_many_arguments)]
    pub fn liquidate<L, B>(
        &mut self,
        ctx: &CallContext,
        borrower: Address,
        token: Address,
        amount: u128,
        vault: &mut CollateralVault,
        ledger: &mut L,
        oracle: &dyn PriceOracle,
        bank: &mut B,
    ) -> Result<LiquidationOutcome>
    where
        L: BorrowLedger + Clone,
        B: TokenBank + Clone,
    {
        let _guard = self.guard.enter()?;
        self.ensure_not_paused()?;
        let liquidator = ctx.caller;

        if liquidator == borrower {
            return Err(Error::SelfLiquidation);
        }
        if amount == 0 {
            return Err(Error::ZeroAmount);
        }
        if amount < MIN_LIQUIDATION_AMOUNT {
            return Err(Error::DustLiquidation {
                amount,
                minimum: MIN_LIQUIDATION_AMOUNT,
            });
        }

        let health_factor = ledger.health_factor_unsafe(&borrower, &*vault, oracle)?;
        if health_factor >= HEALTH_FACTOR_PARITY_BPS {
            return Err(Error::PositionHealthy { health_factor });
        }

        let max_repay = self.max_repay(ledger.total_debt(&borrower), health_factor)?;
        let requested = amount.min(max_repay);
        let quote = self.size_seizure(&borrower, &token, requested, vault, oracle, &*bank)?;
        if quote.collateral_to_seize == 0 || quote.debt_to_repay == 0 {
            return Err(Error::NothingToSeize);
        }

        let repay = quote.debt_to_repay;
        let vault_before = vault.clone();
        let ledger_before = ledger.clone();
        let bank_before = bank.clone();
        if let Err(e) = self.settle(ctx, borrower, token, &quote, vault, ledger, bank) {
            *vault = vault_before;
            *ledger = ledger_before;
            *bank = bank_before;
            return Err(e);
        }

        // Commit
        let mut bad_debt_recorded = 0;
        if quote.bad_debt > 0 {
            let total_bad_debt = self.bad_debt.record(borrower, quote.bad_debt)?;
            bad_debt_recorded = quote.bad_debt;
            info!(%borrower, amount = quote.bad_debt, total_bad_debt, "bad debt recorded");
            self.events.add_event(
                ctx.timestamp,
                CoreEvent::BadDebtRecorded {
                    borrower,
                    amount: quote.bad_debt,
                    total_bad_debt,
                },
            );
        }
        self.stats.total_liquidations += 1;
        self.stats.total_debt_repaid = safe_add(self.stats.total_debt_repaid, repay)?;
        if quote.capped {
            self.stats.capped_liquidations += 1;
        }

        info!(
            %borrower,
            %liquidator,
            %token,
            health_factor,
            debt_repaid = repay,
            collateral_seized = quote.collateral_to_seize,
            "position liquidated"
        );
        self.events.add_event(
            ctx.timestamp,
            CoreEvent::Liquidated {
                borrower,
                liquidator,
                token,
                debt_repaid: repay,
                collateral_seized: quote.collateral_to_seize,
            },
        );

        Ok(LiquidationOutcome {
            borrower,
            liquidator,
            token,
            health_factor_before: health_factor,
            debt_repaid: repay,
            collateral_seized: quote.collateral_to_seize,
            bad_debt_recorded,
        })
    }

    /// Pull and burn the repayment, seize the collateral, reduce the debt
    #[allow(clippy::too_many_arguments)]
    fn settle(
        &self,
        ctx: &CallContext,
        borrower: Address,
        token: Address,
        quote: &SeizureQuote,
        vault: &mut CollateralVault,
        ledger: &mut dyn BorrowLedger,
        bank: &mut dyn TokenBank,
    ) -> Result<()> {
        let liquidator = ctx.caller;
        let repay = quote.debt_to_repay;
        bank.transfer_from(&self.debt_token, &self.address, &liquidator, &self.address, repay)?;
        bank.burn(&self.debt_token, &self.address, repay)?;
        vault.seize(
            &ctx.as_caller(self.address),
            borrower,
            token,
            quote.collateral_to_seize,
            liquidator,
            bank,
        )?;
        ledger.reduce_debt(&borrower, repay)
    }

    /// Whether `borrower` can be liquidated now
    pub fn is_liquidatable(
        &self,
        borrower: &Address,
        vault: &CollateralVault,
        ledger: &dyn BorrowLedger,
        oracle: &dyn PriceOracle,
    ) -> Result<bool> {
        if ledger.total_debt(borrower) == 0 {
            return Ok(false);
        }
        let health_factor = ledger.health_factor_unsafe(borrower, vault, oracle)?;
        Ok(health_factor < HEALTH_FACTOR_PARITY_BPS)
    }

    /// Most debt a single liquidation of `borrower` may repay now
    pub fn max_repayable(
        &self,
        borrower: &Address,
        vault: &CollateralVault,
        ledger: &dyn BorrowLedger,
        oracle: &dyn PriceOracle,
    ) -> Result<u128> {
        let debt = ledger.total_debt(borrower);
        if debt == 0 {
            return Ok(0);
        }
        let health_factor = ledger.health_factor_unsafe(borrower, vault, oracle)?;
        if health_factor >= HEALTH_FACTOR_PARITY_BPS {
            return Ok(0);
        }
        self.max_repay(debt, health_factor)
    }

    /// Preview the seizure for repaying `amount`, without mutation
    pub fn estimate_seize(
        &self,
        borrower: &Address,
        token: &Address,
        amount: u128,
        vault: &CollateralVault,
        oracle: &dyn PriceOracle,
        bank: &dyn TokenBank,
    ) -> Result<SeizureQuote> {
        self.size_seizure(borrower, token, amount, vault, oracle, bank)
    }

    /// Write off `borrower`'s recorded bad debt against reserves and suppliers
    ///
    /// Returns the amount absorbed by the ledger, which is the recorded
    /// amount clamped to the borrower's remaining debt.
    pub fn socialize_bad_debt<L>(
        &mut self,
        ctx: &CallContext,
        borrower: Address,
        ledger: &mut L,
    ) -> Result<u128>
    where
        L: BorrowLedger + Clone,
    {
        let _guard = self.guard.enter()?;
        self.access.ensure(Role::Governance, &ctx.caller)?;

        let recorded = self.bad_debt.of(&borrower);
        if recorded == 0 {
            return Err(Error::NoBadDebt(borrower));
        }
        let absorbed = recorded.min(ledger.total_debt(&borrower));
        if absorbed > 0 {
            let ledger_before = ledger.clone();
            if let Err(e) = ledger
                .reduce_debt(&borrower, absorbed)
                .and_then(|()| ledger.absorb_bad_debt(absorbed))
            {
                *ledger = ledger_before;
                return Err(e);
            }
        }
        self.bad_debt.clear(&borrower)?;
        self.stats.total_bad_debt_socialized =
            safe_add(self.stats.total_bad_debt_socialized, absorbed)?;

        info!(
            %borrower,
            recorded,
            absorbed,
            remaining = self.bad_debt.total(),
            "bad debt socialized"
        );
        self.events.add_event(
            ctx.timestamp,
            CoreEvent::BadDebtSocialized {
                borrower,
                recorded,
                absorbed,
            },
        );
        Ok(absorbed)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Governance
    // ───────────────────────────────────────────────────────────────────────────

    /// Set the share of debt repayable per call
    pub fn set_close_factor(&mut self, ctx: &CallContext, bps: u64) -> Result<()> {
        let _guard = self.guard.enter()?;
        self.access.ensure(Role::Governance, &ctx.caller)?;
        LiquidationParams::validate_close_factor(bps)?;
        self.params.close_factor_bps = bps;
        self.emit_params_updated(ctx);
        Ok(())
    }

    /// Set the health factor below which the whole debt may be repaid
    pub fn set_full_liquidation_threshold(&mut self, ctx: &CallContext, bps: u64) -> Result<()> {
        let _guard = self.guard.enter()?;
        self.access.ensure(Role::Governance, &ctx.caller)?;
        LiquidationParams::validate_full_liquidation_threshold(bps)?;
        self.params.full_liquidation_threshold_bps = bps;
        self.emit_params_updated(ctx);
        Ok(())
    }

    /// Grant `role` to `account`
    pub fn grant_role(&mut self, ctx: &CallContext, role: Role, account: Address) -> Result<()> {
        let _guard = self.guard.enter()?;
        if self.access.grant(&ctx.caller, role, account)? {
            info!(%role, %account, "engine role granted");
            self.events
                .add_event(ctx.timestamp, CoreEvent::RoleGranted { role, account });
        }
        Ok(())
    }

    /// Revoke `role` from `account`
    pub fn revoke_role(&mut self, ctx: &CallContext, role: Role, account: Address) -> Result<()> {
        let _guard = self.guard.enter()?;
        if self.access.revoke(&ctx.caller, role, &account)? {
            info!(%role, %account, "engine role revoked");
            self.events
                .add_event(ctx.timestamp, CoreEvent::RoleRevoked { role, account });
        }
        Ok(())
    }

    /// Stop liquidations
    pub fn pause(&mut self, ctx: &CallContext) -> Result<()> {
        let _guard = self.guard.enter()?;
        self.access.ensure(Role::Pauser, &ctx.caller)?;
        self.set_paused(ctx, true);
        Ok(())
    }

    /// Resume liquidations
    pub fn unpause(&mut self, ctx: &CallContext) -> Result<()> {
        let _guard = self.guard.enter()?;
        self.access.ensure(Role::Admin, &ctx.caller)?;
        self.set_paused(ctx, false);
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Views
    // ───────────────────────────────────────────────────────────────────────────

    /// Engine account
    pub fn address(&self) -> Address {
        self.address
    }

    /// Debt token
    pub fn debt_token(&self) -> Address {
        self.debt_token
    }

    /// Current liquidation parameters
    pub fn params(&self) -> LiquidationParams {
        self.params
    }

    /// Role membership
    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    /// Whether liquidations are paused
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Global bad debt
    pub fn total_bad_debt(&self) -> u128 {
        self.bad_debt.total()
    }

    /// Bad debt recorded against `borrower`
    pub fn borrower_bad_debt(&self, borrower: &Address) -> u128 {
        self.bad_debt.of(borrower)
    }

    /// Bad-debt book
    pub fn bad_debt(&self) -> &BadDebtBook {
        &self.bad_debt
    }

    /// Liquidation statistics
    pub fn statistics(&self) -> &LiquidationStats {
        &self.stats
    }

    /// Retained events
    pub fn events(&self) -> &[SequencedEvent] {
        self.events.events()
    }

    /// Drain retained events
    pub fn take_events(&mut self) -> Vec<SequencedEvent> {
        self.events.take_events()
    }

    /// Check the bad-debt invariant
    pub fn verify_invariant(&self) -> Result<()> {
        self.bad_debt.verify_invariant()
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Internals
    // ───────────────────────────────────────────────────────────────────────────

    fn ensure_not_paused(&self) -> Result<()> {
        if self.paused {
            return Err(Error::ProtocolPaused);
        }
        Ok(())
    }

    fn max_repay(&self, total_debt: u128, health_factor: u64) -> Result<u128> {
        if health_factor < self.params.full_liquidation_threshold_bps {
            Ok(total_debt)
        } else {
            apply_bps(total_debt, self.params.close_factor_bps)
        }
    }

    fn size_seizure(
        &self,
        borrower: &Address,
        token: &Address,
        repay: u128,
        vault: &CollateralVault,
        oracle: &dyn PriceOracle,
        bank: &dyn TokenBank,
    ) -> Result<SeizureQuote> {
        let config = vault
            .collateral_config(token)
            .filter(|c| c.is_added())
            .ok_or(Error::TokenNotSupported(*token))?;
        let penalty = config.liquidation_penalty_bps;
        let decimals = bank.decimals(token)?;

        let price = oracle.price_unsafe(token)?;
        if price == 0 {
            return Err(Error::InvalidPrice(*token));
        }

        let wanted = collateral_for_repayment(repay, penalty, price, decimals)?;
        let available = vault.deposit_of(borrower, token);
        if wanted <= available {
            return Ok(SeizureQuote {
                debt_to_repay: repay,
                collateral_to_seize: wanted,
                bad_debt: 0,
                capped: false,
            });
        }

        let value = oracle.value_usd_unsafe(token, available)?;
        let capped_repay = repayment_for_value(value, penalty)?.min(repay);
        let bad_debt = repay - capped_repay;
        debug!(
            %borrower,
            %token,
            wanted,
            available,
            capped_repay,
            bad_debt,
            "seizure capped at deposit"
        );
        Ok(SeizureQuote {
            debt_to_repay: capped_repay,
            collateral_to_seize: available,
            bad_debt,
            capped: true,
        })
    }

    fn set_paused(&mut self, ctx: &CallContext, paused: bool) {
        self.paused = paused;
        info!(paused, by = %ctx.caller, "engine pause changed");
        self.events.add_event(
            ctx.timestamp,
            CoreEvent::PauseChanged {
                paused,
                by: ctx.caller,
            },
        );
    }

    fn emit_params_updated(&mut self, ctx: &CallContext) {
        info!(
            close_factor_bps = self.params.close_factor_bps,
            full_liquidation_threshold_bps = self.params.full_liquidation_threshold_bps,
            "liquidation parameters updated"
        );
        self.events.add_event(
            ctx.timestamp,
            CoreEvent::LiquidationParamsUpdated {
                close_factor_bps: self.params.close_factor_bps,
                full_liquidation_threshold_bps: self.params.full_liquidation_threshold_bps,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CollateralParams;
    use crate::external::{InMemoryBorrowLedger, InMemoryTokenBank, StaticPriceOracle};

    const T0: u64 = 1_700_000_000;
    const UNIT: u128 = DEBT_TOKEN_UNIT;

    struct World {
        engine: LiquidationEngine,
        vault: CollateralVault,
        ledger: InMemoryBorrowLedger,
        oracle: StaticPriceOracle,
        bank: InMemoryTokenBank,
        weth: Address,
        musd: Address,
    }

    fn addr(label: &str) -> Address {
        Address::from_label(label)
    }

    fn ctx(label: &str) -> CallContext {
        CallContext::new(addr(label), T0)
    }

    /// `deposit` WETH at $2000 for alice, 80% threshold, 5% penalty
    fn world(deposit: u128, debt: u128) -> World {
        let weth = addr("weth");
        let musd = addr("musd");
        let admin = ctx("admin");

        let mut engine = LiquidationEngine::new(addr("engine"), musd, addr("admin")).unwrap();
        engine.grant_role(&admin, Role::Governance, addr("gov")).unwrap();
        engine.grant_role(&admin, Role::Pauser, addr("guardian")).unwrap();

        let mut vault = CollateralVault::new(addr("vault"), addr("admin"), addr("borrow")).unwrap();
        vault.grant_role(&admin, Role::Governance, addr("gov")).unwrap();
        vault.grant_role(&admin, Role::Liquidation, addr("engine")).unwrap();
        vault
            .add_collateral(&ctx("gov"), weth, CollateralParams::new(7_500, 8_000, 500))
            .unwrap();

        let mut bank = InMemoryTokenBank::new();
        bank.register_token(weth, 18);
        bank.register_token(musd, 18);
        bank.mint(&weth, &addr("alice"), deposit).unwrap();
        bank.approve(&weth, &addr("alice"), &addr("vault"), u128::MAX);
        bank.mint(&musd, &addr("keeper"), 1_000_000 * UNIT).unwrap();
        bank.approve(&musd, &addr("keeper"), &addr("engine"), u128::MAX);
        if deposit > 0 {
            vault.deposit(&ctx("alice"), weth, deposit, &mut bank).unwrap();
        }

        let mut oracle = StaticPriceOracle::new();
        oracle.set_price(weth, 2_000 * UNIT, 18);

        let mut ledger = InMemoryBorrowLedger::new();
        ledger.set_debt(addr("alice"), debt);
        ledger.set_reserves(10_000 * UNIT);

        World { engine, vault, ledger, oracle, bank, weth, musd }
    }

    fn liquidate(w: &mut World, amount: u128) -> Result<LiquidationOutcome> {
        w.engine.liquidate(
            &ctx("keeper"),
            addr("alice"),
            w.weth,
            amount,
            &mut w.vault,
            &mut w.ledger,
            &w.oracle,
            &mut w.bank,
        )
    }

    #[test]
    fn test_clean_liquidation() {
        // hf = 16000 / 17777.77 = 0.9
        let debt = 17_777_777_777_777_777_777_778;
        let mut w = world(10 * UNIT, debt);

        let outcome = liquidate(&mut w, 1_000 * UNIT).unwrap();
        assert_eq!(outcome.debt_repaid, 1_000 * UNIT);
        assert_eq!(outcome.collateral_seized, 525_000_000_000_000_000);
        assert_eq!(outcome.bad_debt_recorded, 0);
        assert_eq!(outcome.health_factor_before, 8_999);

        assert_eq!(w.ledger.total_debt(&addr("alice")), debt - 1_000 * UNIT);
        assert_eq!(w.bank.balance_of(&w.weth, &addr("keeper")), 525_000_000_000_000_000);
        assert_eq!(w.bank.balance_of(&w.musd, &w.engine.address()), 0);
        assert_eq!(w.bank.total_supply(&w.musd), 999_000 * UNIT);
        assert_eq!(w.engine.statistics().total_liquidations, 1);
    }

    #[test]
    fn test_close_factor_caps_repayment() {
        // 10 WETH, debt 17,000 -> hf ~0.94, above the full threshold
        let mut w = world(10 * UNIT, 17_000 * UNIT);
        let outcome = liquidate(&mut w, 20_000 * UNIT).unwrap();
        assert_eq!(outcome.debt_repaid, 8_500 * UNIT);
    }

    #[test]
    fn test_full_liquidation_below_threshold() {
        // 1 WETH ($1600 weighted) vs 4000 debt -> hf 0.4
        let mut w = world(UNIT, 4_000 * UNIT);
        let quote_max = w
            .engine
            .max_repayable(&addr("alice"), &w.vault, &w.ledger, &w.oracle)
            .unwrap();
        assert_eq!(quote_max, 4_000 * UNIT);
    }

    #[test]
    fn test_capped_seizure_records_bad_debt() {
        // 0.1 WETH ($200) vs 1000 debt -> hf 0.16, full liquidation allowed
        let mut w = world(UNIT / 10, 1_000 * UNIT);
        let outcome = liquidate(&mut w, 1_000 * UNIT).unwrap();

        let capped = 200 * UNIT * 10_000 / 10_500;
        assert_eq!(outcome.collateral_seized, UNIT / 10);
        assert_eq!(outcome.debt_repaid, capped);
        assert_eq!(outcome.bad_debt_recorded, 1_000 * UNIT - capped);
        assert_eq!(w.engine.total_bad_debt(), 1_000 * UNIT - capped);
        assert_eq!(w.engine.borrower_bad_debt(&addr("alice")), 1_000 * UNIT - capped);
        assert_eq!(w.vault.deposit_of(&addr("alice"), &w.weth), 0);
        assert!(w.engine.verify_invariant().is_ok());
    }

    #[test]
    fn test_eligibility_rejections() {
        let mut w = world(10 * UNIT, 17_000 * UNIT);

        let self_liq = w.engine.liquidate(
            &ctx("alice"),
            addr("alice"),
            w.weth,
            1_000 * UNIT,
            &mut w.vault,
            &mut w.ledger,
            &w.oracle,
            &mut w.bank,
        );
        assert_eq!(self_liq, Err(Error::SelfLiquidation));
        assert_eq!(liquidate(&mut w, 0), Err(Error::ZeroAmount));
        assert!(matches!(liquidate(&mut w, 99 * UNIT), Err(Error::DustLiquidation { .. })));

        w.ledger.set_debt(addr("alice"), 8_000 * UNIT);
        assert_eq!(
            liquidate(&mut w, 1_000 * UNIT),
            Err(Error::PositionHealthy { health_factor: 20_000 })
        );
    }

    #[test]
    fn test_zero_price_rejected() {
        let mut w = world(10 * UNIT, 17_000 * UNIT);
        let quote = w.engine.estimate_seize(
            &addr("alice"),
            &w.weth,
            1_000 * UNIT,
            &w.vault,
            &w.oracle,
            &w.bank,
        );
        assert!(quote.is_ok());

        w.oracle.set_price(w.weth, 0, 18);
        let quote = w.engine.estimate_seize(
            &addr("alice"),
            &w.weth,
            1_000 * UNIT,
            &w.vault,
            &w.oracle,
            &w.bank,
        );
        assert_eq!(quote, Err(Error::InvalidPrice(w.weth)));
    }

    #[test]
    fn test_liquidation_ignores_breaker() {
        let mut w = world(10 * UNIT, 17_000 * UNIT);
        w.oracle.set_breaker(w.weth, true);
        assert!(liquidate(&mut w, 1_000 * UNIT).is_ok());
    }

    #[test]
    fn test_estimate_matches_liquidation() {
        let mut w = world(10 * UNIT, 17_000 * UNIT);
        let quote = w
            .engine
            .estimate_seize(&addr("alice"), &w.weth, 2_000 * UNIT, &w.vault, &w.oracle, &w.bank)
            .unwrap();
        let outcome = liquidate(&mut w, 2_000 * UNIT).unwrap();

        assert_eq!(quote.collateral_to_seize, outcome.collateral_seized);
        assert_eq!(quote.debt_to_repay, outcome.debt_repaid);
    }

    #[test]
    fn test_failed_settlement_leaves_engine_unchanged() {
        let mut w = world(UNIT / 10, 1_000 * UNIT);
        w.bank.set_frozen(w.musd, true);

        assert!(matches!(liquidate(&mut w, 1_000 * UNIT), Err(Error::TransferFailed { .. })));
        assert_eq!(w.engine.total_bad_debt(), 0);
        assert_eq!(w.engine.statistics().total_liquidations, 0);
    }

    #[test]
    fn test_failed_debt_reduction_restores_settlement() {
        // hf 0.9: 1000 repaid for 0.525 WETH if settlement completes
        let mut w = world(10 * UNIT, 17_777_777_777_777_777_777_778);
        w.ledger.set_reject_reductions(true);

        let result = liquidate(&mut w, 1_000 * UNIT);
        assert_eq!(result, Err(Error::Ledger("debt reductions rejected".into())));

        assert_eq!(w.bank.balance_of(&w.musd, &addr("keeper")), 1_000_000 * UNIT);
        assert_eq!(w.bank.total_supply(&w.musd), 1_000_000 * UNIT);
        assert_eq!(w.bank.balance_of(&w.weth, &addr("keeper")), 0);
        assert_eq!(w.bank.balance_of(&w.weth, &addr("vault")), 10 * UNIT);
        assert_eq!(w.vault.deposit_of(&addr("alice"), &w.weth), 10 * UNIT);
        assert_eq!(w.vault.total_deposits(&w.weth), 10 * UNIT);
        assert!(w.vault.verify_invariant().is_ok());
        assert_eq!(w.engine.statistics().total_liquidations, 0);

        w.ledger.set_reject_reductions(false);
        let outcome = liquidate(&mut w, 1_000 * UNIT).unwrap();
        assert_eq!(outcome.collateral_seized, 525_000_000_000_000_000);
    }

    #[test]
    fn test_failed_absorption_restores_debt() {
        let mut w = world(UNIT / 10, 1_000 * UNIT);
        liquidate(&mut w, 1_000 * UNIT).unwrap();
        let recorded = w.engine.total_bad_debt();
        // No reserves and no suppliers to take the loss
        w.ledger.set_reserves(0);

        let result = w.engine.socialize_bad_debt(&ctx("gov"), addr("alice"), &mut w.ledger);
        assert!(matches!(result, Err(Error::Ledger(_))));
        assert_eq!(w.ledger.total_debt(&addr("alice")), recorded);
        assert_eq!(w.engine.borrower_bad_debt(&addr("alice")), recorded);
        assert_eq!(w.engine.total_bad_debt(), recorded);
    }

    #[test]
    fn test_socialize_bad_debt() {
        let mut w = world(UNIT / 10, 1_000 * UNIT);
        liquidate(&mut w, 1_000 * UNIT).unwrap();
        let recorded = w.engine.total_bad_debt();
        let remaining_debt = w.ledger.total_debt(&addr("alice"));
        assert_eq!(recorded, remaining_debt);

        let not_gov = w.engine.socialize_bad_debt(&ctx("keeper"), addr("alice"), &mut w.ledger);
        assert!(matches!(not_gov, Err(Error::MissingRole { .. })));

        let absorbed = w
            .engine
            .socialize_bad_debt(&ctx("gov"), addr("alice"), &mut w.ledger)
            .unwrap();
        assert_eq!(absorbed, recorded);
        assert_eq!(w.engine.total_bad_debt(), 0);
        assert_eq!(w.ledger.total_debt(&addr("alice")), 0);
        assert_eq!(w.ledger.reserves(), 10_000 * UNIT - recorded);

        assert_eq!(
            w.engine.socialize_bad_debt(&ctx("gov"), addr("alice"), &mut w.ledger),
            Err(Error::NoBadDebt(addr("alice")))
        );
    }

    #[test]
    fn test_socialize_clamps_to_ledger_debt() {
        let mut w = world(UNIT / 10, 1_000 * UNIT);
        liquidate(&mut w, 1_000 * UNIT).unwrap();
        // Borrower repaid elsewhere
        w.ledger.set_debt(addr("alice"), 0);

        let absorbed = w
            .engine
            .socialize_bad_debt(&ctx("gov"), addr("alice"), &mut w.ledger)
            .unwrap();
        assert_eq!(absorbed, 0);
        assert_eq!(w.engine.total_bad_debt(), 0);
        assert_eq!(w.ledger.reserves(), 10_000 * UNIT);
    }

    #[test]
    fn test_is_liquidatable() {
        let w = world(10 * UNIT, 0);
        assert!(!w.engine.is_liquidatable(&addr("alice"), &w.vault, &w.ledger, &w.oracle).unwrap());

        let w = world(10 * UNIT, 17_000 * UNIT);
        assert!(w.engine.is_liquidatable(&addr("alice"), &w.vault, &w.ledger, &w.oracle).unwrap());
    }

    #[test]
    fn test_parameter_governance() {
        let mut w = world(0, 0);
        assert!(w.engine.set_close_factor(&ctx("keeper"), 6_000).is_err());
        assert!(w.engine.set_close_factor(&ctx("gov"), 0).is_err());
        w.engine.set_close_factor(&ctx("gov"), 6_000).unwrap();
        w.engine.set_full_liquidation_threshold(&ctx("gov"), 9_000).unwrap();
        assert!(w.engine.set_full_liquidation_threshold(&ctx("gov"), 10_000).is_err());

        assert_eq!(w.engine.params().close_factor_bps, 6_000);
        assert_eq!(w.engine.params().full_liquidation_threshold_bps, 9_000);
    }

    #[test]
    fn test_pause_blocks_liquidation() {
        let mut w = world(10 * UNIT, 17_000 * UNIT);
        w.engine.pause(&ctx("guardian")).unwrap();
        assert_eq!(liquidate(&mut w, 1_000 * UNIT), Err(Error::ProtocolPaused));
        w.engine.unpause(&ctx("admin")).unwrap();
        assert!(liquidate(&mut w, 1_000 * UNIT).is_ok());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let mut w = world(UNIT / 10, 1_000 * UNIT);
        liquidate(&mut w, 1_000 * UNIT).unwrap();

        let bytes = w.engine.to_bytes().unwrap();
        let restored = LiquidationEngine::from_bytes(&bytes).unwrap();
        assert_eq!(restored.total_bad_debt(), w.engine.total_bad_debt());
        assert_eq!(restored.statistics(), w.engine.statistics());
    }
}
