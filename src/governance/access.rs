//! Role-based capability sets.
//!
//! Each component keeps its own `AccessControl`. Entry points begin with
//! `ensure(role, caller)`; no single owner key bypasses the check.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::error::{Error, Result};
use crate::utils::address::Address;

// ═══════════════════════════════════════════════════════════════════════════════
// ROLES
// ═══════════════════════════════════════════════════════════════════════════════

/// Capabilities that can be granted to accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Grants and revokes roles, unpauses
    Admin,
    /// Proposes, cancels and executes timelocked collateral changes
    VaultAdmin,
    /// External governance executor (its own timelock runs outside this core)
    Governance,
    /// May seize collateral
    Liquidation,
    /// Integrator managing positions on a user's behalf
    LeverageVault,
    /// May pause
    Pauser,
}

impl Role {
    /// All roles
    pub const ALL: [Role; 6] = [
        Role::Admin,
        Role::VaultAdmin,
        Role::Governance,
        Role::Liquidation,
        Role::LeverageVault,
        Role::Pauser,
    ];

    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::VaultAdmin => "VAULT_ADMIN",
            Self::Governance => "GOVERNANCE",
            Self::Liquidation => "LIQUIDATION",
            Self::LeverageVault => "LEVERAGE_VAULT",
            Self::Pauser => "PAUSER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ACCESS CONTROL
// ═══════════════════════════════════════════════════════════════════════════════

/// Role membership for one component
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessControl {
    members: HashMap<Role, BTreeSet<Address>>,
}

impl AccessControl {
    /// Create with `admin` holding the Admin role
    pub fn new(admin: Address) -> Result<Self> {
        admin.ensure_non_zero("admin")?;
        let mut members: HashMap<Role, BTreeSet<Address>> = HashMap::new();
        members.entry(Role::Admin).or_default().insert(admin);
        Ok(Self { members })
    }

    /// Whether `account` holds `role`
    pub fn has_role(&self, role: Role, account: &Address) -> bool {
        self.members
            .get(&role)
            .map(|set| set.contains(account))
            .unwrap_or(false)
    }

    /// Fail unless `account` holds `role`
    pub fn ensure(&self, role: Role, account: &Address) -> Result<()> {
        if !self.has_role(role, account) {
            return Err(Error::MissingRole {
                account: *account,
                role,
            });
        }
        Ok(())
    }

    /// Grant `role` to `account`; returns false if already held
    pub fn grant(&mut self, caller: &Address, role: Role, account: Address) -> Result<bool> {
        self.ensure(Role::Admin, caller)?;
        account.ensure_non_zero("account")?;
        Ok(self.members.entry(role).or_default().insert(account))
    }

    /// Revoke `role` from `account`; returns false if not held
    pub fn revoke(&mut self, caller: &Address, role: Role, account: &Address) -> Result<bool> {
        self.ensure(Role::Admin, caller)?;
        if role == Role::Admin && caller == account && self.members(Role::Admin).len() == 1 {
            return Err(Error::InvalidParameter {
                name: "account".into(),
                reason: "cannot revoke the last admin".into(),
            });
        }
        Ok(self
            .members
            .get_mut(&role)
            .map(|set| set.remove(account))
            .unwrap_or(false))
    }

    /// Accounts holding `role`, ordered
    pub fn members(&self, role: Role) -> Vec<Address> {
        self.members
            .get(&role)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }
}
