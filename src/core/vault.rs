//! Collateral custody.
//!
//! This module manages the vault that holds user collateral:
//! - Per-user, per-token deposit balances
//! - The supported-token list and per-token risk configuration
//! - Timelocked admin changes (add, update, borrow module)
//! - Deposits, seizures and the two withdrawal paths
//!
//! Balances are decremented before tokens leave and restored if the
//! transfer or the post-withdrawal health check fails.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::core::config::{CollateralConfig, CollateralParams};
use crate::core::context::CallContext;
use crate::error::{Error, Result};
use crate::external::{BorrowLedger, CollateralView, HealthReading, PriceOracle, TokenBank};
use crate::governance::access::{AccessControl, Role};
use crate::governance::timelock::{PendingChange, TimelockQueue, TimelockSlot};
use crate::protocol::events::{AdminKnob, CoreEvent, EventLog, SequencedEvent};
use crate::utils::address::Address;
use crate::utils::constants::*;
use crate::utils::guard::ReentrancyGuard;
use crate::utils::math::{safe_add, safe_sub};

// ═══════════════════════════════════════════════════════════════════════════════
// COLLATERAL VAULT
// ═══════════════════════════════════════════════════════════════════════════════

/// Custody of user collateral
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollateralVault {
    /// Account holding the collateral in the token bank
    address: Address,
    access: AccessControl,
    /// The borrow ledger's address; only it may call `withdraw`
    borrow_module: Address,
    configs: BTreeMap<Address, CollateralConfig>,
    /// Append-only, insertion ordered
    supported_tokens: Vec<Address>,
    /// user -> token -> amount
    deposits: BTreeMap<Address, BTreeMap<Address, u128>>,
    /// token -> sum of deposits
    totals: BTreeMap<Address, u128>,
    pending_adds: TimelockQueue<Address, CollateralParams>,
    pending_updates: TimelockQueue<Address, CollateralParams>,
    pending_borrow_module: TimelockSlot<Address>,
    paused: bool,
    events: EventLog,
    #[serde(skip)]
    guard: ReentrancyGuard,
}

impl CollateralVault {
    /// Create a vault at `address`, administered by `admin`
    pub fn new(address: Address, admin: Address, borrow_module: Address) -> Result<Self> {
        address.ensure_non_zero("vault")?;
        borrow_module.ensure_non_zero("borrow_module")?;
        Ok(Self {
            address,
            access: AccessControl::new(admin)?,
            borrow_module,
            configs: BTreeMap::new(),
            supported_tokens: Vec::new(),
            deposits: BTreeMap::new(),
            totals: BTreeMap::new(),
            pending_adds: TimelockQueue::new("add collateral"),
            pending_updates: TimelockQueue::new("update collateral"),
            pending_borrow_module: TimelockSlot::new("borrow module"),
            paused: false,
            events: EventLog::default(),
            guard: ReentrancyGuard::new(),
        })
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Custody
    // ───────────────────────────────────────────────────────────────────────────

    /// Deposit the caller's collateral; returns the amount credited
    pub fn deposit(
        &mut self,
        ctx: &CallContext,
        token: Address,
        amount: u128,
        bank: &mut dyn TokenBank,
    ) -> Result<u128> {
        let _guard = self.guard.enter()?;
        self.ensure_not_paused()?;

        let received = self.pull_and_credit(ctx.caller, ctx.caller, token, amount, bank)?;
        debug!(user = %ctx.caller, %token, received, "collateral deposited");
        self.events.add_event(
            ctx.timestamp,
            CoreEvent::Deposited {
                user: ctx.caller,
                token,
                amount: received,
            },
        );
        Ok(received)
    }

    /// Deposit the caller's collateral on behalf of `user`
    pub fn deposit_for(
        &mut self,
        ctx: &CallContext,
        user: Address,
        token: Address,
        amount: u128,
        bank: &mut dyn TokenBank,
    ) -> Result<u128> {
        let _guard = self.guard.enter()?;
        self.ensure_not_paused()?;
        self.access.ensure(Role::LeverageVault, &ctx.caller)?;
        user.ensure_non_zero("user")?;

        let received = self.pull_and_credit(ctx.caller, user, token, amount, bank)?;
        debug!(funder = %ctx.caller, %user, %token, received, "collateral deposited for user");
        self.events.add_event(
            ctx.timestamp,
            CoreEvent::DepositedFor {
                funder: ctx.caller,
                user,
                token,
                amount: received,
            },
        );
        Ok(received)
    }

    /// Release collateral to `user`; only the borrow module may call
    pub fn withdraw(
        &mut self,
        ctx: &CallContext,
        user: Address,
        token: Address,
        amount: u128,
        bank: &mut dyn TokenBank,
    ) -> Result<()> {
        let _guard = self.guard.enter()?;
        if ctx.caller != self.borrow_module {
            return Err(Error::Unauthorized(format!(
                "{} is not the borrow module",
                ctx.caller
            )));
        }
        if amount == 0 {
            return Err(Error::ZeroAmount);
        }

        self.debit_and_send(user, token, amount, user, bank)?;
        debug!(%user, %token, amount, "collateral withdrawn");
        self.events.add_event(
            ctx.timestamp,
            CoreEvent::Withdrawn {
                user,
                token,
                amount,
            },
        );
        Ok(())
    }

    /// Transfer a borrower's collateral to a liquidator
    pub fn seize(
        &mut self,
        ctx: &CallContext,
        user: Address,
        token: Address,
        amount: u128,
        liquidator: Address,
        bank: &mut dyn TokenBank,
    ) -> Result<()> {
        let _guard = self.guard.enter()?;
        self.access.ensure(Role::Liquidation, &ctx.caller)?;
        liquidator.ensure_non_zero("liquidator")?;
        if amount == 0 {
            return Err(Error::ZeroAmount);
        }

        self.debit_and_send(user, token, amount, liquidator, bank)?;
        info!(%user, %token, amount, %liquidator, "collateral seized");
        self.events.add_event(
            ctx.timestamp,
            CoreEvent::Seized {
                user,
                token,
                amount,
                liquidator,
            },
        );
        Ok(())
    }

    /// Release a user's collateral on the integrator path
    ///
    /// The balance is decremented first so the health check sees the
    /// post-withdrawal position. Zero debt skips the check. Otherwise the
    /// breaker-checked health factor is read, falling back to the unsafe
    /// read, and the withdrawal is rejected when neither answers.
    #[allow(clippy::too_many_arguments)]
    pub fn withdraw_for(
        &mut self,
        ctx: &CallContext,
        user: Address,
        token: Address,
        amount: u128,
        recipient: Address,
        skip_health_check: bool,
        bank: &mut dyn TokenBank,
        ledger: &dyn BorrowLedger,
        oracle: &dyn PriceOracle,
    ) -> Result<()> {
        let _guard = self.guard.enter()?;
        self.ensure_not_paused()?;
        self.access.ensure(Role::LeverageVault, &ctx.caller)?;
        if amount == 0 {
            return Err(Error::ZeroAmount);
        }
        recipient.ensure_non_zero("recipient")?;
        if skip_health_check && recipient != ctx.caller && recipient != user {
            return Err(Error::InvalidRecipient(recipient));
        }

        let receipt = self.debit(&user, &token, amount)?;

        if !skip_health_check {
            if let Err(e) = self.check_withdrawal_health(&user, ledger, oracle) {
                self.undo_debit(receipt);
                return Err(e);
            }
        }

        if let Err(e) = bank.transfer(&token, &self.address, &recipient, amount) {
            self.undo_debit(receipt);
            return Err(e);
        }

        debug!(operator = %ctx.caller, %user, %token, amount, %recipient, skip_health_check,
            "collateral withdrawn for user");
        self.events.add_event(
            ctx.timestamp,
            CoreEvent::WithdrawnFor {
                operator: ctx.caller,
                user,
                token,
                amount,
                recipient,
                health_check_skipped: skip_health_check,
            },
        );
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Timelocked administration
    // ───────────────────────────────────────────────────────────────────────────

    /// Propose adding `token` with `params`
    pub fn request_add_collateral(
        &mut self,
        ctx: &CallContext,
        token: Address,
        params: CollateralParams,
    ) -> Result<()> {
        let _guard = self.guard.enter()?;
        self.access.ensure(Role::VaultAdmin, &ctx.caller)?;
        self.validate_add(&token, &params)?;

        self.pending_adds.propose(token, params, ctx.timestamp);
        self.emit_requested(ctx, AdminKnob::AddCollateral(token));
        Ok(())
    }

    /// Drop the pending addition of `token`
    pub fn cancel_add_collateral(&mut self, ctx: &CallContext, token: Address) -> Result<()> {
        let _guard = self.guard.enter()?;
        self.access.ensure(Role::VaultAdmin, &ctx.caller)?;
        self.pending_adds.cancel(&token)?;
        self.events.add_event(
            ctx.timestamp,
            CoreEvent::AdminChangeCancelled {
                knob: AdminKnob::AddCollateral(token),
            },
        );
        Ok(())
    }

    /// Execute the pending addition of `token` once its delay has elapsed
    pub fn execute_add_collateral(&mut self, ctx: &CallContext, token: Address) -> Result<()> {
        let _guard = self.guard.enter()?;
        self.access.ensure(Role::VaultAdmin, &ctx.caller)?;
        let params = self
            .pending_adds
            .ready_value(&token, ctx.timestamp, ADMIN_CHANGE_DELAY_SECS)?;
        // The token may have been added through governance meanwhile
        self.validate_add(&token, &params)?;

        self.insert_collateral(token, params);
        self.pending_adds.clear(&token);
        info!(%token, ?params, "collateral added");
        self.events.add_event(
            ctx.timestamp,
            CoreEvent::CollateralConfigured {
                token,
                params,
                via_governance: false,
            },
        );
        Ok(())
    }

    /// Add `token` directly; the governance executor enforces its own delay
    pub fn add_collateral(
        &mut self,
        ctx: &CallContext,
        token: Address,
        params: CollateralParams,
    ) -> Result<()> {
        let _guard = self.guard.enter()?;
        self.access.ensure(Role::Governance, &ctx.caller)?;
        self.validate_add(&token, &params)?;

        self.insert_collateral(token, params);
        info!(%token, ?params, "collateral added by governance");
        self.events.add_event(
            ctx.timestamp,
            CoreEvent::CollateralConfigured {
                token,
                params,
                via_governance: true,
            },
        );
        Ok(())
    }

    /// Propose new risk parameters for an added token
    pub fn request_update_collateral(
        &mut self,
        ctx: &CallContext,
        token: Address,
        params: CollateralParams,
    ) -> Result<()> {
        let _guard = self.guard.enter()?;
        self.access.ensure(Role::VaultAdmin, &ctx.caller)?;
        self.validate_update(&token, &params)?;

        self.pending_updates.propose(token, params, ctx.timestamp);
        self.emit_requested(ctx, AdminKnob::UpdateCollateral(token));
        Ok(())
    }

    /// Drop the pending update of `token`
    pub fn cancel_update_collateral(&mut self, ctx: &CallContext, token: Address) -> Result<()> {
        let _guard = self.guard.enter()?;
        self.access.ensure(Role::VaultAdmin, &ctx.caller)?;
        self.pending_updates.cancel(&token)?;
        self.events.add_event(
            ctx.timestamp,
            CoreEvent::AdminChangeCancelled {
                knob: AdminKnob::UpdateCollateral(token),
            },
        );
        Ok(())
    }

    /// Execute the pending update of `token` once its delay has elapsed
    pub fn execute_update_collateral(&mut self, ctx: &CallContext, token: Address) -> Result<()> {
        let _guard = self.guard.enter()?;
        self.access.ensure(Role::VaultAdmin, &ctx.caller)?;
        let params = self
            .pending_updates
            .ready_value(&token, ctx.timestamp, ADMIN_CHANGE_DELAY_SECS)?;
        self.validate_update(&token, &params)?;

        if let Some(config) = self.configs.get_mut(&token) {
            config.apply(params);
        }
        self.pending_updates.clear(&token);
        info!(%token, ?params, "collateral updated");
        self.events.add_event(
            ctx.timestamp,
            CoreEvent::CollateralConfigured {
                token,
                params,
                via_governance: false,
            },
        );
        Ok(())
    }

    /// Propose a new borrow module
    pub fn request_borrow_module_change(
        &mut self,
        ctx: &CallContext,
        new_module: Address,
    ) -> Result<()> {
        let _guard = self.guard.enter()?;
        self.access.ensure(Role::VaultAdmin, &ctx.caller)?;
        new_module.ensure_non_zero("borrow_module")?;

        self.pending_borrow_module.propose(new_module, ctx.timestamp);
        self.emit_requested(ctx, AdminKnob::BorrowModule);
        Ok(())
    }

    /// Drop the pending borrow module change
    pub fn cancel_borrow_module_change(&mut self, ctx: &CallContext) -> Result<()> {
        let _guard = self.guard.enter()?;
        self.access.ensure(Role::VaultAdmin, &ctx.caller)?;
        self.pending_borrow_module.cancel()?;
        self.events.add_event(
            ctx.timestamp,
            CoreEvent::AdminChangeCancelled {
                knob: AdminKnob::BorrowModule,
            },
        );
        Ok(())
    }

    /// Execute the pending borrow module change once its delay has elapsed
    pub fn execute_borrow_module_change(&mut self, ctx: &CallContext) -> Result<()> {
        let _guard = self.guard.enter()?;
        self.access.ensure(Role::VaultAdmin, &ctx.caller)?;
        let new_module = self
            .pending_borrow_module
            .ready_value(ctx.timestamp, ADMIN_CHANGE_DELAY_SECS)?;
        new_module.ensure_non_zero("borrow_module")?;

        let previous = std::mem::replace(&mut self.borrow_module, new_module);
        self.pending_borrow_module.clear();
        info!(%previous, current = %new_module, "borrow module changed");
        self.events.add_event(
            ctx.timestamp,
            CoreEvent::BorrowModuleChanged {
                previous,
                current: new_module,
            },
        );
        Ok(())
    }

    /// Stop accepting new deposits of `token`
    pub fn disable_collateral(&mut self, ctx: &CallContext, token: Address) -> Result<()> {
        self.set_enabled(ctx, token, false)
    }

    /// Accept deposits of a previously added `token` again
    pub fn enable_collateral(&mut self, ctx: &CallContext, token: Address) -> Result<()> {
        self.set_enabled(ctx, token, true)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Roles and pause
    // ───────────────────────────────────────────────────────────────────────────

    /// Grant `role` to `account`
    pub fn grant_role(&mut self, ctx: &CallContext, role: Role, account: Address) -> Result<()> {
        let _guard = self.guard.enter()?;
        if self.access.grant(&ctx.caller, role, account)? {
            info!(%role, %account, "vault role granted");
            self.events
                .add_event(ctx.timestamp, CoreEvent::RoleGranted { role, account });
        }
        Ok(())
    }

    /// Revoke `role` from `account`
    pub fn revoke_role(&mut self, ctx: &CallContext, role: Role, account: Address) -> Result<()> {
        let _guard = self.guard.enter()?;
        if self.access.revoke(&ctx.caller, role, &account)? {
            info!(%role, %account, "vault role revoked");
            self.events
                .add_event(ctx.timestamp, CoreEvent::RoleRevoked { role, account });
        }
        Ok(())
    }

    /// Pause deposits and integrator withdrawals
    pub fn pause(&mut self, ctx: &CallContext) -> Result<()> {
        let _guard = self.guard.enter()?;
        self.access.ensure(Role::Pauser, &ctx.caller)?;
        self.set_paused(ctx, true);
        Ok(())
    }

    /// Resume normal operation
    pub fn unpause(&mut self, ctx: &CallContext) -> Result<()> {
        let _guard = self.guard.enter()?;
        self.access.ensure(Role::Admin, &ctx.caller)?;
        self.set_paused(ctx, false);
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Views
    // ───────────────────────────────────────────────────────────────────────────

    /// Account holding the collateral
    pub fn address(&self) -> Address {
        self.address
    }

    /// Current borrow module
    pub fn borrow_module(&self) -> Address {
        self.borrow_module
    }

    /// Whether the vault is paused
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Role membership
    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    /// Sum of all deposits of `token`
    pub fn total_deposits(&self, token: &Address) -> u128 {
        self.totals.get(token).copied().unwrap_or(0)
    }

    /// Pending addition of `token`
    pub fn pending_add(&self, token: &Address) -> Option<&PendingChange<CollateralParams>> {
        self.pending_adds.get(token)
    }

    /// Pending update of `token`
    pub fn pending_update(&self, token: &Address) -> Option<&PendingChange<CollateralParams>> {
        self.pending_updates.get(token)
    }

    /// Pending borrow module change
    pub fn pending_borrow_module(&self) -> Option<&PendingChange<Address>> {
        self.pending_borrow_module.pending()
    }

    /// USD value of all of `user`'s collateral, disabled tokens included
    pub fn collateral_value_usd(&self, user: &Address, oracle: &dyn PriceOracle) -> Result<u128> {
        let mut total = 0u128;
        for token in &self.supported_tokens {
            let amount = self.deposit_of(user, token);
            if amount > 0 {
                total = safe_add(total, oracle.value_usd(token, amount)?)?;
            }
        }
        Ok(total)
    }

    /// Check that per-token totals equal the sum of user deposits
    pub fn verify_invariant(&self) -> Result<()> {
        let mut sums: BTreeMap<Address, u128> = BTreeMap::new();
        for balances in self.deposits.values() {
            for (token, amount) in balances {
                let entry = sums.entry(*token).or_insert(0);
                *entry = safe_add(*entry, *amount)?;
            }
        }
        for token in self.totals.keys().chain(sums.keys()) {
            let recorded = self.total_deposits(token);
            let summed = sums.get(token).copied().unwrap_or(0);
            if recorded != summed {
                return Err(Error::InvariantViolation(format!(
                    "token {} total {} != sum of deposits {}",
                    token, recorded, summed
                )));
            }
        }
        Ok(())
    }

    /// Retained events
    pub fn events(&self) -> &[SequencedEvent] {
        self.events.events()
    }

    /// Drain retained events
    pub fn take_events(&mut self) -> Vec<SequencedEvent> {
        self.events.take_events()
    }

    /// Compute state hash over configuration and balances
    pub fn state_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.borrow_module.as_bytes());
        for token in &self.supported_tokens {
            hasher.update(token.as_bytes());
            if let Some(config) = self.configs.get(token) {
                hasher.update([config.enabled as u8]);
                hasher.update(config.collateral_factor_bps.to_be_bytes());
                hasher.update(config.liquidation_threshold_bps.to_be_bytes());
                hasher.update(config.liquidation_penalty_bps.to_be_bytes());
            }
        }
        for (user, balances) in &self.deposits {
            for (token, amount) in balances {
                hasher.update(user.as_bytes());
                hasher.update(token.as_bytes());
                hasher.update(amount.to_be_bytes());
            }
        }
        hex::encode(hasher.finalize())
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

    fn ensure_enabled(&self, token: &Address) -> Result<()> {
        match self.configs.get(token) {
            Some(config) if config.enabled => Ok(()),
            Some(_) => Err(Error::TokenDisabled(*token)),
            None => Err(Error::TokenNotSupported(*token)),
        }
    }

    fn validate_add(&self, token: &Address, params: &CollateralParams) -> Result<()> {
        token.ensure_non_zero("token")?;
        params.validate()?;
        if self.configs.get(token).map(|c| c.is_added()).unwrap_or(false) {
            return Err(Error::TokenAlreadyAdded(*token));
        }
        if self.supported_tokens.len() >= MAX_SUPPORTED_TOKENS {
            return Err(Error::TooManyTokens {
                max: MAX_SUPPORTED_TOKENS,
            });
        }
        Ok(())
    }

    fn validate_update(&self, token: &Address, params: &CollateralParams) -> Result<()> {
        if !self.configs.get(token).map(|c| c.is_added()).unwrap_or(false) {
            return Err(Error::TokenNotSupported(*token));
        }
        params.validate()
    }

    fn insert_collateral(&mut self, token: Address, params: CollateralParams) {
        self.configs
            .insert(token, CollateralConfig::from_params(params));
        self.supported_tokens.push(token);
    }

    fn set_enabled(&mut self, ctx: &CallContext, token: Address, enabled: bool) -> Result<()> {
        let _guard = self.guard.enter()?;
        self.access.ensure(Role::VaultAdmin, &ctx.caller)?;
        let config = self
            .configs
            .get_mut(&token)
            .filter(|c| c.is_added())
            .ok_or(Error::TokenNotSupported(token))?;
        config.enabled = enabled;

        info!(%token, enabled, "collateral status changed");
        self.events.add_event(
            ctx.timestamp,
            CoreEvent::CollateralStatusChanged { token, enabled },
        );
        Ok(())
    }

    fn set_paused(&mut self, ctx: &CallContext, paused: bool) {
        self.paused = paused;
        info!(paused, by = %ctx.caller, "vault pause changed");
        self.events.add_event(
            ctx.timestamp,
            CoreEvent::PauseChanged {
                paused,
                by: ctx.caller,
            },
        );
    }

    fn emit_requested(&mut self, ctx: &CallContext, knob: AdminKnob) {
        let ready_at = ctx.timestamp.saturating_add(ADMIN_CHANGE_DELAY_SECS);
        info!(?knob, ready_at, "admin change requested");
        self.events.add_event(
            ctx.timestamp,
            CoreEvent::AdminChangeRequested {
                knob,
                requested_at: ctx.timestamp,
                ready_at,
            },
        );
    }

    fn pull_and_credit(
        &mut self,
        funder: Address,
        user: Address,
        token: Address,
        amount: u128,
        bank: &mut dyn TokenBank,
    ) -> Result<u128> {
        if amount == 0 {
            return Err(Error::ZeroAmount);
        }
        self.ensure_enabled(&token)?;

        let before = bank.balance_of(&token, &self.address);
        bank.transfer_from(&token, &self.address, &funder, &self.address, amount)?;
        let after = bank.balance_of(&token, &self.address);
        let received = safe_sub(after, before)?;
        if received == 0 {
            return Err(Error::ZeroAmount);
        }

        self.credit(&user, &token, received)?;
        Ok(received)
    }

    fn debit_and_send(
        &mut self,
        user: Address,
        token: Address,
        amount: u128,
        to: Address,
        bank: &mut dyn TokenBank,
    ) -> Result<()> {
        let receipt = self.debit(&user, &token, amount)?;
        if let Err(e) = bank.transfer(&token, &self.address, &to, amount) {
            self.undo_debit(receipt);
            return Err(e);
        }
        Ok(())
    }

    fn credit(&mut self, user: &Address, token: &Address, amount: u128) -> Result<()> {
        let balance = safe_add(self.deposit_of(user, token), amount)?;
        let total = safe_add(self.total_deposits(token), amount)?;
        self.deposits.entry(*user).or_default().insert(*token, balance);
        self.totals.insert(*token, total);
        Ok(())
    }

    fn debit(&mut self, user: &Address, token: &Address, amount: u128) -> Result<DebitReceipt> {
        let available = self.deposit_of(user, token);
        if available < amount {
            return Err(Error::InsufficientDeposit {
                required: amount,
                available,
            });
        }
        let total_before = self.total_deposits(token);
        let total = safe_sub(total_before, amount)?;
        self.deposits
            .entry(*user)
            .or_default()
            .insert(*token, available - amount);
        self.totals.insert(*token, total);
        Ok(DebitReceipt {
            user: *user,
            token: *token,
            balance: available,
            total: total_before,
        })
    }

    /// Put back the balances a debit replaced
    fn undo_debit(&mut self, receipt: DebitReceipt) {
        self.deposits
            .entry(receipt.user)
            .or_default()
            .insert(receipt.token, receipt.balance);
        self.totals.insert(receipt.token, receipt.total);
    }

    fn check_withdrawal_health(
        &self,
        user: &Address,
        ledger: &dyn BorrowLedger,
        oracle: &dyn PriceOracle,
    ) -> Result<()> {
        if ledger.total_debt(user) == 0 {
            return Ok(());
        }

        let health_factor = match HealthReading::read(ledger, user, self, oracle) {
            HealthReading::Primary(hf) => hf,
            HealthReading::Fallback(hf) => {
                warn!(%user, hf, "primary health read failed, using breaker-bypassing read");
                hf
            }
            HealthReading::Unavailable => {
                warn!(%user, "health factor unavailable, rejecting withdrawal");
                return Err(Error::OracleUnavailable);
            }
        };

        if health_factor < MIN_WITHDRAW_HEALTH_FACTOR_BPS {
            warn!(%user, health_factor, "withdrawal would undercollateralize");
            return Err(Error::WithdrawalWouldUndercollateralize {
                health_factor,
                minimum: MIN_WITHDRAW_HEALTH_FACTOR_BPS,
            });
        }
        Ok(())
    }
}

/// Deposit and total of a token before a debit
#[derive(Debug, Clone, Copy)]
struct DebitReceipt {
    user: Address,
    token: Address,
    balance: u128,
    total: u128,
}

impl CollateralView for CollateralVault {
    fn supported_tokens(&self) -> Vec<Address> {
        self.supported_tokens.clone()
    }

    fn collateral_config(&self, token: &Address) -> Option<CollateralConfig> {
        self.configs.get(token).copied()
    }

    fn deposit_of(&self, user: &Address, token: &Address) -> u128 {
        self.deposits
            .get(user)
            .and_then(|balances| balances.get(token))
            .copied()
            .unwrap_or(0)
    }
}
