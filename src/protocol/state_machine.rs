//! Protocol State Machine - core orchestration.
//!
//! The state machine owns the vault, the liquidation engine and the
//! collaborator handles. Every mutating entry point runs as a transaction:
//! state is snapshotted on entry and restored if the call fails, so a
//! failed call leaves no partial effect anywhere.

use tracing::warn;

use crate::core::config::CollateralParams;
use crate::core::context::CallContext;
use crate::core::vault::CollateralVault;
use crate::error::Result;
use crate::external::{BorrowLedger, PriceOracle, TokenBank};
use crate::governance::access::Role;
use crate::liquidation::engine::{LiquidationEngine, LiquidationOutcome, SeizureQuote};
use crate::utils::address::Address;

// ═══════════════════════════════════════════════════════════════════════════════
// STATE MACHINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Protocol state machine - orchestrates all operations
#[derive(Debug)]
pub struct ProtocolStateMachine<L, O, B> {
    vault: CollateralVault,
    engine: LiquidationEngine,
    ledger: L,
    oracle: O,
    bank: B,
    /// Current timestamp
    timestamp: u64,
}

struct Snapshot<L, B> {
    vault: CollateralVault,
    engine: LiquidationEngine,
    ledger: L,
    bank: B,
}

impl<L, O, B> ProtocolStateMachine<L, O, B>
where
    L: BorrowLedger + Clone,
    O: PriceOracle,
    B: TokenBank + Clone,
{
    /// Create a state machine over existing components
    pub fn new(
        vault: CollateralVault,
        engine: LiquidationEngine,
        ledger: L,
        oracle: O,
        bank: B,
        timestamp: u64,
    ) -> Self {
        Self {
            vault,
            engine,
            ledger,
            oracle,
            bank,
            timestamp,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // TIME
    // ═══════════════════════════════════════════════════════════════════════════

    /// Current timestamp
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Set the current timestamp (never moves backwards)
    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = self.timestamp.max(timestamp);
    }

    /// Move time forward
    pub fn advance_time(&mut self, secs: u64) {
        self.timestamp = self.timestamp.saturating_add(secs);
    }

    fn ctx(&self, caller: Address) -> CallContext {
        CallContext::new(caller, self.timestamp)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // TRANSACTIONS
    // ═══════════════════════════════════════════════════════════════════════════

    fn snapshot(&self) -> Snapshot<L, B> {
        Snapshot {
            vault: self.vault.clone(),
            engine: self.engine.clone(),
            ledger: self.ledger.clone(),
            bank: self.bank.clone(),
        }
    }

    fn restore(&mut self, snapshot: Snapshot<L, B>) {
        self.vault = snapshot.vault;
        self.engine = snapshot.engine;
        self.ledger = snapshot.ledger;
        self.bank = snapshot.bank;
    }

    /// Run `op` atomically
    fn transact<T>(
        &mut self,
        operation: &'static str,
        op: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let snapshot = self.snapshot();
        match op(self) {
            Ok(value) => Ok(value),
            Err(e) => {
                self.restore(snapshot);
                warn!(operation, code = e.code(), error = %e, "operation rolled back");
                Err(e)
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CUSTODY
    // ═══════════════════════════════════════════════════════════════════════════

    /// Deposit the caller's collateral
    pub fn deposit(&mut self, caller: Address, token: Address, amount: u128) -> Result<u128> {
        let ctx = self.ctx(caller);
        self.transact("deposit", |sm| {
            sm.vault.deposit(&ctx, token, amount, &mut sm.bank)
        })
    }

    /// Deposit on behalf of `user`
    pub fn deposit_for(
        &mut self,
        caller: Address,
        user: Address,
        token: Address,
        amount: u128,
    ) -> Result<u128> {
        let ctx = self.ctx(caller);
        self.transact("deposit_for", |sm| {
            sm.vault.deposit_for(&ctx, user, token, amount, &mut sm.bank)
        })
    }

    /// Borrow module withdrawal
    pub fn withdraw(
        &mut self,
        caller: Address,
        user: Address,
        token: Address,
        amount: u128,
    ) -> Result<()> {
        let ctx = self.ctx(caller);
        self.transact("withdraw", |sm| {
            sm.vault.withdraw(&ctx, user, token, amount, &mut sm.bank)
        })
    }

    /// Direct seizure by a liquidation-role holder
    pub fn seize(
        &mut self,
        caller: Address,
        user: Address,
        token: Address,
        amount: u128,
        liquidator: Address,
    ) -> Result<()> {
        let ctx = self.ctx(caller);
        self.transact("seize", |sm| {
            sm.vault.seize(&ctx, user, token, amount, liquidator, &mut sm.bank)
        })
    }

    /// Integrator withdrawal with the post-withdrawal health check
    pub fn withdraw_for(
        &mut self,
        caller: Address,
        user: Address,
        token: Address,
        amount: u128,
        recipient: Address,
        skip_health_check: bool,
    ) -> Result<()> {
        let ctx = self.ctx(caller);
        self.transact("withdraw_for", |sm| {
            sm.vault.withdraw_for(
                &ctx,
                user,
                token,
                amount,
                recipient,
                skip_health_check,
                &mut sm.bank,
                &sm.ledger,
                &sm.oracle,
            )
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LIQUIDATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Liquidate `borrower`, paying the caller in `token`
    pub fn liquidate(
        &mut self,
        caller: Address,
        borrower: Address,
        token: Address,
        amount: u128,
    ) -> Result<LiquidationOutcome> {
        let ctx = self.ctx(caller);
        self.transact("liquidate", |sm| {
            sm.engine.liquidate(
                &ctx,
                borrower,
                token,
                amount,
                &mut sm.vault,
                &mut sm.ledger,
                &sm.oracle,
                &mut sm.bank,
            )
        })
    }

    /// Write off `borrower`'s bad debt
    pub fn socialize_bad_debt(&mut self, caller: Address, borrower: Address) -> Result<u128> {
        let ctx = self.ctx(caller);
        self.transact("socialize_bad_debt", |sm| {
            sm.engine.socialize_bad_debt(&ctx, borrower, &mut sm.ledger)
        })
    }

    /// Whether `borrower` can be liquidated now
    pub fn is_liquidatable(&self, borrower: &Address) -> Result<bool> {
        self.engine
            .is_liquidatable(borrower, &self.vault, &self.ledger, &self.oracle)
    }

    /// Preview the seizure for repaying `amount`
    pub fn estimate_seize(
        &self,
        borrower: &Address,
        token: &Address,
        amount: u128,
    ) -> Result<SeizureQuote> {
        self.engine
            .estimate_seize(borrower, token, amount, &self.vault, &self.oracle, &self.bank)
    }

    /// Most debt one liquidation of `borrower` may repay now
    pub fn max_repayable(&self, borrower: &Address) -> Result<u128> {
        self.engine
            .max_repayable(borrower, &self.vault, &self.ledger, &self.oracle)
    }

    /// Current health factor of `borrower`, ignoring the breaker
    pub fn health_factor(&self, borrower: &Address) -> Result<u64> {
        self.ledger
            .health_factor_unsafe(borrower, &self.vault, &self.oracle)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ADMINISTRATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Propose adding collateral
    pub fn request_add_collateral(
        &mut self,
        caller: Address,
        token: Address,
        params: CollateralParams,
    ) -> Result<()> {
        let ctx = self.ctx(caller);
        self.transact("request_add_collateral", |sm| {
            sm.vault.request_add_collateral(&ctx, token, params)
        })
    }

    /// Cancel a proposed addition
    pub fn cancel_add_collateral(&mut self, caller: Address, token: Address) -> Result<()> {
        let ctx = self.ctx(caller);
        self.transact("cancel_add_collateral", |sm| {
            sm.vault.cancel_add_collateral(&ctx, token)
        })
    }

    /// Execute a proposed addition
    pub fn execute_add_collateral(&mut self, caller: Address, token: Address) -> Result<()> {
        let ctx = self.ctx(caller);
        self.transact("execute_add_collateral", |sm| {
            sm.vault.execute_add_collateral(&ctx, token)
        })
    }

    /// Governance-executed addition
    pub fn add_collateral(
        &mut self,
        caller: Address,
        token: Address,
        params: CollateralParams,
    ) -> Result<()> {
        let ctx = self.ctx(caller);
        self.transact("add_collateral", |sm| {
            sm.vault.add_collateral(&ctx, token, params)
        })
    }

    /// Propose a collateral update
    pub fn request_update_collateral(
        &mut self,
        caller: Address,
        token: Address,
        params: CollateralParams,
    ) -> Result<()> {
        let ctx = self.ctx(caller);
        self.transact("request_update_collateral", |sm| {
            sm.vault.request_update_collateral(&ctx, token, params)
        })
    }

    /// Cancel a proposed update
    pub fn cancel_update_collateral(&mut self, caller: Address, token: Address) -> Result<()> {
        let ctx = self.ctx(caller);
        self.transact("cancel_update_collateral", |sm| {
            sm.vault.cancel_update_collateral(&ctx, token)
        })
    }

    /// Execute a proposed update
    pub fn execute_update_collateral(&mut self, caller: Address, token: Address) -> Result<()> {
        let ctx = self.ctx(caller);
        self.transact("execute_update_collateral", |sm| {
            sm.vault.execute_update_collateral(&ctx, token)
        })
    }

    /// Propose a new borrow module
    pub fn request_borrow_module_change(&mut self, caller: Address, module: Address) -> Result<()> {
        let ctx = self.ctx(caller);
        self.transact("request_borrow_module_change", |sm| {
            sm.vault.request_borrow_module_change(&ctx, module)
        })
    }

    /// Cancel the proposed borrow module
    pub fn cancel_borrow_module_change(&mut self, caller: Address) -> Result<()> {
        let ctx = self.ctx(caller);
        self.transact("cancel_borrow_module_change", |sm| {
            sm.vault.cancel_borrow_module_change(&ctx)
        })
    }

    /// Execute the proposed borrow module
    pub fn execute_borrow_module_change(&mut self, caller: Address) -> Result<()> {
        let ctx = self.ctx(caller);
        self.transact("execute_borrow_module_change", |sm| {
            sm.vault.execute_borrow_module_change(&ctx)
        })
    }

    /// Disable deposits of `token`
    pub fn disable_collateral(&mut self, caller: Address, token: Address) -> Result<()> {
        let ctx = self.ctx(caller);
        self.transact("disable_collateral", |sm| {
            sm.vault.disable_collateral(&ctx, token)
        })
    }

    /// Re-enable deposits of `token`
    pub fn enable_collateral(&mut self, caller: Address, token: Address) -> Result<()> {
        let ctx = self.ctx(caller);
        self.transact("enable_collateral", |sm| {
            sm.vault.enable_collateral(&ctx, token)
        })
    }

    /// Set the close factor
    pub fn set_close_factor(&mut self, caller: Address, bps: u64) -> Result<()> {
        let ctx = self.ctx(caller);
        self.transact("set_close_factor", |sm| sm.engine.set_close_factor(&ctx, bps))
    }

    /// Set the full-liquidation threshold
    pub fn set_full_liquidation_threshold(&mut self, caller: Address, bps: u64) -> Result<()> {
        let ctx = self.ctx(caller);
        self.transact("set_full_liquidation_threshold", |sm| {
            sm.engine.set_full_liquidation_threshold(&ctx, bps)
        })
    }

    /// Grant `role` on the vault
    pub fn grant_vault_role(
        &mut self,
        caller: Address,
        role: Role,
        account: Address,
    ) -> Result<()> {
        let ctx = self.ctx(caller);
        self.transact("grant_vault_role", |sm| sm.vault.grant_role(&ctx, role, account))
    }

    /// Revoke `role` on the vault
    pub fn revoke_vault_role(
        &mut self,
        caller: Address,
        role: Role,
        account: Address,
    ) -> Result<()> {
        let ctx = self.ctx(caller);
        self.transact("revoke_vault_role", |sm| sm.vault.revoke_role(&ctx, role, account))
    }

    /// Grant `role` on the engine
    pub fn grant_engine_role(
        &mut self,
        caller: Address,
        role: Role,
        account: Address,
    ) -> Result<()> {
        let ctx = self.ctx(caller);
        self.transact("grant_engine_role", |sm| sm.engine.grant_role(&ctx, role, account))
    }

    /// Revoke `role` on the engine
    pub fn revoke_engine_role(
        &mut self,
        caller: Address,
        role: Role,
        account: Address,
    ) -> Result<()> {
        let ctx = self.ctx(caller);
        self.transact("revoke_engine_role", |sm| sm.engine.revoke_role(&ctx, role, account))
    }

    /// Pause the vault and the engine
    pub fn pause(&mut self, caller: Address) -> Result<()> {
        let ctx = self.ctx(caller);
        self.transact("pause", |sm| {
            sm.vault.pause(&ctx)?;
            sm.engine.pause(&ctx)
        })
    }

    /// Unpause the vault and the engine
    pub fn unpause(&mut self, caller: Address) -> Result<()> {
        let ctx = self.ctx(caller);
        self.transact("unpause", |sm| {
            sm.vault.unpause(&ctx)?;
            sm.engine.unpause(&ctx)
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ACCESSORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// The vault
    pub fn vault(&self) -> &CollateralVault {
        &self.vault
    }

    /// The liquidation engine
    pub fn engine(&self) -> &LiquidationEngine {
        &self.engine
    }

    /// The borrow ledger
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Mutable borrow ledger, for driving debt outside this core
    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    /// The price oracle
    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Mutable price oracle
    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    /// The token bank
    pub fn bank(&self) -> &B {
        &self.bank
    }

    /// Mutable token bank
    pub fn bank_mut(&mut self) -> &mut B {
        &mut self.bank
    }

    /// Check the vault and bad-debt invariants
    pub fn verify_invariants(&self) -> Result<()> {
        self.vault.verify_invariant()?;
        self.engine.verify_invariant()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::external::{
        CollateralView, InMemoryBorrowLedger, InMemoryTokenBank, StaticPriceOracle,
    };
    use crate::utils::constants::DEBT_TOKEN_UNIT;

    const UNIT: u128 = DEBT_TOKEN_UNIT;

    type Machine = ProtocolStateMachine<InMemoryBorrowLedger, StaticPriceOracle, InMemoryTokenBank>;

    fn addr(label: &str) -> Address {
        Address::from_label(label)
    }

    fn machine() -> Machine {
        let admin = addr("admin");
        let weth = addr("weth");
        let musd = addr("musd");

        let vault = CollateralVault::new(addr("vault"), admin, addr("borrow")).unwrap();
        let engine = LiquidationEngine::new(addr("engine"), musd, admin).unwrap();
        let mut bank = InMemoryTokenBank::new();
        bank.register_token(weth, 18);
        bank.register_token(musd, 18);
        bank.mint(&weth, &addr("alice"), UNIT).unwrap();
        bank.approve(&weth, &addr("alice"), &addr("vault"), u128::MAX);
        bank.mint(&musd, &addr("keeper"), 10_000 * UNIT).unwrap();
        bank.approve(&musd, &addr("keeper"), &addr("engine"), u128::MAX);
        let mut oracle = StaticPriceOracle::new();
        oracle.set_price(weth, 2_000 * UNIT, 18);

        let mut sm = ProtocolStateMachine::new(
            vault,
            engine,
            InMemoryBorrowLedger::new(),
            oracle,
            bank,
            1_700_000_000,
        );
        sm.grant_vault_role(admin, Role::Governance, addr("gov")).unwrap();
        sm.grant_vault_role(admin, Role::Liquidation, addr("engine")).unwrap();
        sm.grant_engine_role(admin, Role::Pauser, addr("guardian")).unwrap();
        sm.grant_vault_role(admin, Role::Pauser, addr("guardian")).unwrap();
        sm.add_collateral(addr("gov"), weth, CollateralParams::new(7_500, 8_000, 500))
            .unwrap();
        sm.deposit(addr("alice"), weth, UNIT).unwrap();
        sm
    }

    #[test]
    fn test_failed_liquidation_rolls_back_everything() {
        let mut sm = machine();
        let (alice, weth) = (addr("alice"), addr("weth"));
        sm.ledger_mut().set_debt(alice, 1_800 * UNIT);
        sm.ledger_mut().set_reject_reductions(true);

        let vault_before = sm.vault().state_hash();
        let keeper_musd = sm.bank().balance_of(&addr("musd"), &addr("keeper"));

        // Fails at the last settlement step, after the burn and the seizure
        let result = sm.liquidate(addr("keeper"), alice, weth, 500 * UNIT);
        assert!(matches!(result, Err(Error::Ledger(_))));

        assert_eq!(sm.vault().state_hash(), vault_before);
        assert_eq!(sm.vault().deposit_of(&alice, &weth), UNIT);
        assert_eq!(sm.bank().balance_of(&addr("musd"), &addr("keeper")), keeper_musd);
        assert_eq!(sm.bank().balance_of(&weth, &addr("keeper")), 0);
        assert_eq!(sm.engine().statistics().total_liquidations, 0);
        assert!(sm.verify_invariants().is_ok());
    }

    #[test]
    fn test_successful_liquidation_commits() {
        let mut sm = machine();
        let (alice, weth) = (addr("alice"), addr("weth"));
        sm.ledger_mut().set_debt(alice, 1_800 * UNIT);

        let outcome = sm.liquidate(addr("keeper"), alice, weth, 500 * UNIT).unwrap();
        assert_eq!(sm.ledger().total_debt(&alice), 1_300 * UNIT);
        assert_eq!(
            sm.bank().balance_of(&weth, &addr("keeper")),
            outcome.collateral_seized
        );
        assert!(sm.verify_invariants().is_ok());
    }

    #[test]
    fn test_pause_both_components() {
        let mut sm = machine();
        sm.pause(addr("guardian")).unwrap();
        assert!(sm.vault().is_paused());
        assert!(sm.engine().is_paused());

        // Pauser cannot unpause; nothing half-applied
        assert!(sm.unpause(addr("guardian")).is_err());
        assert!(sm.vault().is_paused());

        sm.unpause(addr("admin")).unwrap();
        assert!(!sm.engine().is_paused());
    }

    #[test]
    fn test_timestamp_monotonic() {
        let mut sm = machine();
        let t = sm.timestamp();
        sm.set_timestamp(t - 10);
        assert_eq!(sm.timestamp(), t);
        sm.advance_time(5);
        assert_eq!(sm.timestamp(), t + 5);
    }
}
