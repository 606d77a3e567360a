//! Core modules for the collateral core.
//!
//! This module contains the fundamental building blocks:
//! - Collateral and liquidation parameters
//! - Call context (caller and block time)
//! - The collateral vault

pub mod config;
pub mod context;
pub mod vault;

pub use config::*;
pub use context::*;
pub use vault::*;
