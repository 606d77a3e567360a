//! Governance primitives for the collateral core.
//!
//! - Role-based capability sets, one per component
//! - Delayed pending-change slots for admin knobs
//!
//! Voting and the external governance timelock are outside this core;
//! they reach it through an account holding the `Governance` role.

pub mod access;
pub mod timelock;

pub use access::*;
pub use timelock::*;
