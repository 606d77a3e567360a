//! Liquidation module.
//!
//! This module handles liquidations of unhealthy positions:
//! - Liquidation engine sizing and settling seizures
//! - Bad-debt book for shortfalls the collateral could not cover

pub mod bad_debt;
pub mod engine;

pub use bad_debt::*;
pub use engine::*;
