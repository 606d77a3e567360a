//! Utility modules for the collateral core.
//!
//! This module contains shared utilities used across the core:
//! - Addresses
//! - Checked, wide-intermediate arithmetic
//! - Reentrancy guard
//! - Constants

pub mod address;
pub mod constants;
pub mod guard;
pub mod math;

pub use address::*;
pub use constants::*;
pub use guard::*;
pub use math::*;
